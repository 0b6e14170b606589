//! Policy pack and plugin metadata.
//!
//! [`AnalyzerInfo`] describes the policy pack an analyzer carries and is
//! queried for reporting and auditing. It never drives enforcement; the
//! enforcement level on each returned diagnostic does.


use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::contract::ContractViolation;
use crate::diagnostic::EnforcementLevel;
use crate::protocol::PROTOCOL_VERSION;

/// Static description of one policy in a pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDescriptor {
    name: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    description: String,
    enforcement_level: EnforcementLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

impl PolicyDescriptor {
    /// Creates a descriptor with the given identifier and default level.
    #[must_use]
    pub fn new(name: impl Into<String>, enforcement_level: EnforcementLevel) -> Self {
        Self {
            name: name.into(),
            display_name: String::new(),
            description: String::new(),
            enforcement_level,
            message: None,
            tags: Vec::new(),
        }
    }

    /// Sets the human-facing name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Sets the description of what the policy checks.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the remediation message shown alongside violations.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets classification tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the policy identifier.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the display name, falling back to the identifier.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.display_name.is_empty() {
            self.name.as_str()
        } else {
            self.display_name.as_str()
        }
    }

    /// Returns the description.
    #[must_use]
    pub const fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the default enforcement level.
    #[must_use]
    pub const fn enforcement_level(&self) -> EnforcementLevel {
        self.enforcement_level
    }

    /// Returns the remediation message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the classification tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// Metadata about the policy pack inside an analyzer.
///
/// # Example
///
/// ```
/// use policy_analyzer::{AnalyzerInfo, EnforcementLevel, PolicyDescriptor};
///
/// let info = AnalyzerInfo::new("baseline", "Baseline policies").with_policies(vec![
///     PolicyDescriptor::new("no-public-buckets", EnforcementLevel::Mandatory),
/// ]);
/// assert!(info.policy("no-public-buckets").is_some());
/// assert!(info.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerInfo {
    name: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    policies: Vec<PolicyDescriptor>,
}

impl AnalyzerInfo {
    /// Creates metadata for a pack with no policies.
    #[must_use]
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            policies: Vec::new(),
        }
    }

    /// Sets the ordered policy list.
    #[must_use]
    pub fn with_policies(mut self, policies: Vec<PolicyDescriptor>) -> Self {
        self.policies = policies;
        self
    }

    /// Returns the pack's machine identifier.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the pack's human label.
    #[must_use]
    pub const fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the policies in declaration order.
    #[must_use]
    pub fn policies(&self) -> &[PolicyDescriptor] {
        &self.policies
    }

    /// Finds a policy by identifier.
    #[must_use]
    pub fn policy(&self, name: &str) -> Option<&PolicyDescriptor> {
        self.policies.iter().find(|policy| policy.name() == name)
    }

    /// Checks that the pack name is present and policy names are unique.
    ///
    /// # Errors
    ///
    /// Returns [`ContractViolation::InvalidAnalyzerInfo`] describing the first
    /// problem found.
    pub fn validate(&self) -> Result<(), ContractViolation> {
        if self.name.trim().is_empty() {
            return Err(ContractViolation::InvalidAnalyzerInfo {
                message: String::from("policy pack name must not be empty"),
            });
        }
        let mut seen = HashSet::new();
        for policy in &self.policies {
            if policy.name().trim().is_empty() {
                return Err(ContractViolation::InvalidAnalyzerInfo {
                    message: String::from("policy name must not be empty"),
                });
            }
            if !seen.insert(policy.name()) {
                return Err(ContractViolation::InvalidAnalyzerInfo {
                    message: format!("policy '{}' is declared more than once", policy.name()),
                });
            }
        }
        Ok(())
    }
}

/// Plugin metadata reported for compatibility checks and auditing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    name: String,
    version: String,
    #[serde(default = "default_protocol_version")]
    protocol_version: u32,
}

const fn default_protocol_version() -> u32 {
    PROTOCOL_VERSION
}

impl PluginInfo {
    /// Creates plugin metadata speaking the current protocol version.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            protocol_version: PROTOCOL_VERSION,
        }
    }

    /// Overrides the advertised protocol version.
    #[must_use]
    pub const fn with_protocol_version(mut self, protocol_version: u32) -> Self {
        self.protocol_version = protocol_version;
        self
    }

    /// Returns the plugin name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the plugin version.
    #[must_use]
    pub const fn version(&self) -> &str {
        self.version.as_str()
    }

    /// Returns the protocol version the plugin speaks.
    #[must_use]
    pub const fn protocol_version(&self) -> u32 {
        self.protocol_version
    }

    /// Returns `true` when the plugin speaks this crate's protocol version.
    #[must_use]
    pub const fn is_compatible(&self) -> bool {
        self.protocol_version == PROTOCOL_VERSION
    }
}
