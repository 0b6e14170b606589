//! Caller-side checks on what analyzers return.
//!
//! Analyzers run out of process and cannot be trusted to honour the contract.
//! A [`DiagnosticValidator`] checks each returned diagnostic against the set
//! of resources the call was about, and a [`ViolationPolicy`] decides whether
//! a malformed diagnostic fails the call or is dropped with a warning.

#[cfg(test)]
mod tests;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::warn;

use crate::diagnostic::{AnalyzeDiagnostic, EnforcementLevel};
use crate::error::AnalyzerError;
use crate::resource::{AnalyzerResource, Urn};

/// Tracing target for contract checks.
const CONTRACT_TARGET: &str = "policy_analyzer::contract";

/// A structurally invalid analyzer result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    /// A diagnostic was returned at the `disabled` level.
    #[error("policy '{policy}' returned a disabled-level diagnostic for '{urn}'")]
    DisabledDiagnostic {
        /// Policy that produced the diagnostic.
        policy: String,
        /// Subject resource.
        urn: Urn,
    },

    /// A diagnostic names a resource that was not part of the call.
    #[error("policy '{policy}' attributed a diagnostic to unknown resource '{urn}'")]
    UnknownSubject {
        /// Policy that produced the diagnostic.
        policy: String,
        /// The unrecognised URN.
        urn: Urn,
    },

    /// A diagnostic lacks part of its policy identity.
    #[error("diagnostic for '{urn}' is missing its {field}")]
    MissingPolicyIdentity {
        /// Subject resource.
        urn: Urn,
        /// Name of the blank field.
        field: &'static str,
    },

    /// Policy pack metadata is malformed.
    #[error("invalid analyzer info: {message}")]
    InvalidAnalyzerInfo {
        /// Description of the problem.
        message: String,
    },
}

/// What to do with a diagnostic that breaks the contract.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ViolationPolicy {
    /// Fail the call with [`AnalyzerError::ContractViolation`].
    #[default]
    Reject,
    /// Drop the offending diagnostic and log a warning.
    Discard,
}

#[derive(Debug)]
enum Subjects<'a> {
    Single(&'a Urn),
    Set(HashSet<&'a Urn>),
}

/// Checks diagnostics against the resources a call was given.
///
/// # Example
///
/// ```
/// use policy_analyzer::contract::DiagnosticValidator;
/// use policy_analyzer::{AnalyzeDiagnostic, AnalyzerResource, EnforcementLevel, PolicyIdentity};
///
/// let bucket = AnalyzerResource::new("urn:a::bucket", "aws:s3/bucket", "bucket");
/// let validator = DiagnosticValidator::for_resource(&bucket);
/// let stray = AnalyzeDiagnostic::new(
///     PolicyIdentity::new("p", "pack", "1.0"),
///     "urn:a::other",
///     EnforcementLevel::Advisory,
///     "wrong resource",
/// );
/// assert!(validator.check(&stray).is_err());
/// ```
#[derive(Debug)]
pub struct DiagnosticValidator<'a> {
    subjects: Subjects<'a>,
}

impl<'a> DiagnosticValidator<'a> {
    /// Validator for a per-resource `analyze` call.
    #[must_use]
    pub const fn for_resource(resource: &'a AnalyzerResource) -> Self {
        Self {
            subjects: Subjects::Single(resource.urn()),
        }
    }

    /// Validator for a stack-wide `analyze_stack` call.
    #[must_use]
    pub fn for_stack(resources: &'a [AnalyzerResource]) -> Self {
        Self {
            subjects: Subjects::Set(resources.iter().map(AnalyzerResource::urn).collect()),
        }
    }

    fn knows(&self, urn: &Urn) -> bool {
        match &self.subjects {
            Subjects::Single(expected) => *expected == urn,
            Subjects::Set(known) => known.contains(urn),
        }
    }

    /// Checks a single diagnostic.
    ///
    /// # Errors
    ///
    /// Returns the first [`ContractViolation`] the diagnostic exhibits.
    pub fn check(&self, diagnostic: &AnalyzeDiagnostic) -> Result<(), ContractViolation> {
        if let Some(field) = diagnostic.policy().missing_field() {
            return Err(ContractViolation::MissingPolicyIdentity {
                urn: diagnostic.urn().clone(),
                field,
            });
        }
        if diagnostic.enforcement_level() == EnforcementLevel::Disabled {
            return Err(ContractViolation::DisabledDiagnostic {
                policy: diagnostic.policy_name().to_owned(),
                urn: diagnostic.urn().clone(),
            });
        }
        if !self.knows(diagnostic.urn()) {
            return Err(ContractViolation::UnknownSubject {
                policy: diagnostic.policy_name().to_owned(),
                urn: diagnostic.urn().clone(),
            });
        }
        Ok(())
    }

    /// Applies `policy` to a batch of diagnostics, preserving order.
    ///
    /// # Errors
    ///
    /// Under [`ViolationPolicy::Reject`], returns
    /// [`AnalyzerError::ContractViolation`] for the first offending
    /// diagnostic.
    pub fn apply(
        &self,
        analyzer: &str,
        policy: ViolationPolicy,
        diagnostics: Vec<AnalyzeDiagnostic>,
    ) -> Result<Vec<AnalyzeDiagnostic>, AnalyzerError> {
        let mut accepted = Vec::with_capacity(diagnostics.len());
        for diagnostic in diagnostics {
            match (self.check(&diagnostic), policy) {
                (Ok(()), _) => accepted.push(diagnostic),
                (Err(violation), ViolationPolicy::Reject) => {
                    return Err(AnalyzerError::ContractViolation {
                        analyzer: analyzer.to_owned(),
                        violation,
                    });
                }
                (Err(violation), ViolationPolicy::Discard) => {
                    warn!(
                        target: CONTRACT_TARGET,
                        analyzer,
                        %violation,
                        "discarding diagnostic that violates the analyzer contract"
                    );
                }
            }
        }
        Ok(accepted)
    }
}
