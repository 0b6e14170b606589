//! Baseline policy pack served as an analyzer plugin.
//!
//! This crate implements a long-lived plugin compatible with
//! `policy-analyzer`. The engine spawns the binary once per run and drives it
//! over JSONL on stdin and stdout until it sends `close`. Two policies are
//! shipped:
//!
//! - `no-public-buckets` (mandatory) flags S3 buckets with a world-readable
//!   ACL.
//! - `stack-has-owner-tag` (advisory) flags a stack in which no resource
//!   carries an `owner` tag.

#[cfg(test)]
mod tests;

use std::io::{BufRead, Write};

use policy_analyzer::host::{HostError, serve};
use policy_analyzer::{
    AnalyzeDiagnostic, Analyzer, AnalyzerConfiguration, AnalyzerError, AnalyzerInfo,
    AnalyzerResource, EnforcementLevel, PluginInfo, PolicyDescriptor, PolicyIdentity,
    PropertyValue,
};
use tracing::debug;

/// Tracing target for baseline policy evaluation.
const BASELINE_TARGET: &str = "policy_analyzer_baseline";

/// Name of the policy pack.
pub const PACK_NAME: &str = "baseline";

/// Version of the policy pack.
pub const PACK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identifier of the public bucket policy.
pub const NO_PUBLIC_BUCKETS: &str = "no-public-buckets";

/// Identifier of the owner tag policy.
pub const STACK_HAS_OWNER_TAG: &str = "stack-has-owner-tag";

const BUCKET_TYPE: &str = "aws:s3/bucket";
const PUBLIC_ACLS: [&str; 2] = ["public-read", "public-read-write"];
const OWNER_TAG_PATH: &str = "tags.owner";

/// The baseline policy pack.
#[derive(Debug, Default)]
pub struct BaselineAnalyzer {
    config: Option<AnalyzerConfiguration>,
}

impl BaselineAnalyzer {
    /// Creates an unconfigured analyzer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the configuration received from the engine, if any.
    #[must_use]
    pub const fn config(&self) -> Option<&AnalyzerConfiguration> {
        self.config.as_ref()
    }

    fn diagnostic(
        descriptor: &PolicyDescriptor,
        resource: &AnalyzerResource,
        message: String,
    ) -> AnalyzeDiagnostic {
        AnalyzeDiagnostic::new(
            PolicyIdentity::new(descriptor.name(), PACK_NAME, PACK_VERSION),
            resource.urn().clone(),
            descriptor.enforcement_level(),
            message,
        )
        .with_description(descriptor.description())
        .with_tags(descriptor.tags().iter().cloned())
    }
}

/// Returns the policies of the pack in declaration order.
#[must_use]
pub fn policies() -> Vec<PolicyDescriptor> {
    vec![
        PolicyDescriptor::new(NO_PUBLIC_BUCKETS, EnforcementLevel::Mandatory)
            .with_display_name("No public buckets")
            .with_description("S3 buckets must not grant public read access.")
            .with_message("Set the bucket ACL to 'private'.")
            .with_tags(["security", "storage"]),
        PolicyDescriptor::new(STACK_HAS_OWNER_TAG, EnforcementLevel::Advisory)
            .with_display_name("Stack has an owner")
            .with_description("At least one resource in a stack names its owner.")
            .with_message("Add an 'owner' tag to the stack's resources.")
            .with_tags(["governance"]),
    ]
}

fn policy(name: &str) -> PolicyDescriptor {
    policies()
        .into_iter()
        .find(|policy| policy.name() == name)
        .unwrap_or_else(|| PolicyDescriptor::new(name, EnforcementLevel::Advisory))
}

/// Returns `true` if the resource is a bucket with a world-readable ACL.
///
/// An ACL that is still unknown during a preview is not flagged.
#[must_use]
pub fn is_public_bucket(resource: &AnalyzerResource) -> bool {
    resource.type_token().as_str() == BUCKET_TYPE
        && resource
            .property("acl")
            .map(PropertyValue::reveal)
            .and_then(PropertyValue::as_str)
            .is_some_and(|acl| PUBLIC_ACLS.contains(&acl))
}

fn has_owner(resource: &AnalyzerResource) -> bool {
    resource
        .property(OWNER_TAG_PATH)
        .map(PropertyValue::reveal)
        .is_some_and(|owner| {
            owner.is_unknown() || owner.as_str().is_some_and(|name| !name.trim().is_empty())
        })
}

impl Analyzer for BaselineAnalyzer {
    fn name(&self) -> &str {
        PACK_NAME
    }

    fn configure(&mut self, config: &AnalyzerConfiguration) -> Result<(), AnalyzerError> {
        config.validate(PACK_NAME)?;
        self.config = Some(config.clone());
        Ok(())
    }

    fn analyze(
        &mut self,
        resource: &AnalyzerResource,
    ) -> Result<Vec<AnalyzeDiagnostic>, AnalyzerError> {
        if !is_public_bucket(resource) {
            return Ok(Vec::new());
        }
        debug!(target: BASELINE_TARGET, urn = %resource.urn(), "public bucket found");
        Ok(vec![Self::diagnostic(
            &policy(NO_PUBLIC_BUCKETS),
            resource,
            format!("bucket {} has public ACL", resource.name()),
        )])
    }

    fn analyze_stack(
        &mut self,
        resources: &[AnalyzerResource],
    ) -> Result<Vec<AnalyzeDiagnostic>, AnalyzerError> {
        let Some(first) = resources.first() else {
            return Ok(Vec::new());
        };
        if resources.iter().any(has_owner) {
            return Ok(Vec::new());
        }
        let stack = self
            .config
            .as_ref()
            .map_or("unknown", AnalyzerConfiguration::stack_name);
        Ok(vec![Self::diagnostic(
            &policy(STACK_HAS_OWNER_TAG),
            first,
            format!("no resource in stack {stack} carries an owner tag"),
        )])
    }

    fn analyzer_info(&mut self) -> Result<AnalyzerInfo, AnalyzerError> {
        Ok(AnalyzerInfo::new(PACK_NAME, "Baseline policies").with_policies(policies()))
    }

    fn plugin_info(&mut self) -> Result<PluginInfo, AnalyzerError> {
        Ok(PluginInfo::new(PACK_NAME, PACK_VERSION))
    }

    fn close(&mut self) -> Result<(), AnalyzerError> {
        self.config = None;
        Ok(())
    }
}

/// Serves the baseline pack over `stdin` and `stdout` until `close` or end of
/// input.
///
/// # Errors
///
/// Returns an error if the streams fail or a response cannot be encoded.
pub fn run(stdin: &mut impl BufRead, stdout: &mut impl Write) -> Result<(), HostError> {
    serve(stdin, stdout, BaselineAnalyzer::new())
}
