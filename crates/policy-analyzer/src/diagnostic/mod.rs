//! Diagnostic records produced by policy checks.
//!
//! A diagnostic is the immutable result of one policy check against one
//! resource. Diagnostics are data rather than errors: a mandatory diagnostic
//! is how an analyzer says a change should be blocked, and it is up to the
//! caller's policy layer to act on it.

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::resource::Urn;

/// Severity classification of a policy.
///
/// The set is closed so that matching on it stays exhaustive. `Disabled` only
/// exists to describe policy configuration; a diagnostic carrying it is a
/// contract violation by the analyzer that returned it.
///
/// # Example
///
/// ```
/// use policy_analyzer::{Disposition, EnforcementLevel};
///
/// let level: EnforcementLevel = "mandatory".parse().unwrap();
/// assert_eq!(level.disposition(), Disposition::Blocking);
/// assert_eq!(level.to_string(), "mandatory");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EnforcementLevel {
    /// Violations are reported but do not block the operation.
    Advisory,
    /// Violations block the operation.
    Mandatory,
    /// The policy is switched off and must not report anything.
    Disabled,
}

impl EnforcementLevel {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Advisory => "advisory",
            Self::Mandatory => "mandatory",
            Self::Disabled => "disabled",
        }
    }

    /// Returns how a diagnostic at this level is presented.
    #[must_use]
    pub const fn disposition(self) -> Disposition {
        match self {
            Self::Advisory => Disposition::Warning,
            Self::Mandatory => Disposition::Blocking,
            Self::Disabled => Disposition::Anomaly,
        }
    }

    /// Returns `true` when a diagnostic at this level blocks the operation.
    #[must_use]
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::Mandatory)
    }
}

/// User-visible treatment of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Disposition {
    /// Presented as blocking the operation.
    Blocking,
    /// Presented as a warning.
    Warning,
    /// Must never appear; reported as an analyzer anomaly.
    Anomaly,
}

/// Identifies the rule that produced a diagnostic.
///
/// Policy name, pack name and pack version together disambiguate a rule when
/// several policy packs are loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyIdentity {
    policy_name: String,
    policy_pack_name: String,
    policy_pack_version: String,
}

impl PolicyIdentity {
    /// Creates a policy identity.
    #[must_use]
    pub fn new(
        policy_name: impl Into<String>,
        policy_pack_name: impl Into<String>,
        policy_pack_version: impl Into<String>,
    ) -> Self {
        Self {
            policy_name: policy_name.into(),
            policy_pack_name: policy_pack_name.into(),
            policy_pack_version: policy_pack_version.into(),
        }
    }

    /// Returns the policy name.
    #[must_use]
    pub const fn policy_name(&self) -> &str {
        self.policy_name.as_str()
    }

    /// Returns the owning policy pack's name.
    #[must_use]
    pub const fn policy_pack_name(&self) -> &str {
        self.policy_pack_name.as_str()
    }

    /// Returns the owning policy pack's version.
    #[must_use]
    pub const fn policy_pack_version(&self) -> &str {
        self.policy_pack_version.as_str()
    }

    /// Returns the name of the first blank identity field, if any.
    #[must_use]
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("policy name", &self.policy_name),
            ("policy pack name", &self.policy_pack_name),
            ("policy pack version", &self.policy_pack_version),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
    }
}

/// Result of one policy check against one resource.
///
/// # Example
///
/// ```
/// use policy_analyzer::{AnalyzeDiagnostic, EnforcementLevel, PolicyIdentity};
///
/// let diagnostic = AnalyzeDiagnostic::new(
///     PolicyIdentity::new("no-public-buckets", "baseline", "1.0.0"),
///     "urn:pkg:aws:s3/bucket::my-bucket",
///     EnforcementLevel::Mandatory,
///     "bucket my-bucket has public ACL",
/// )
/// .with_tags(["security"]);
///
/// assert!(diagnostic.is_blocking());
/// assert_eq!(diagnostic.urn().name(), "my-bucket");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeDiagnostic {
    #[serde(flatten)]
    policy: PolicyIdentity,
    #[serde(default)]
    description: String,
    message: String,
    #[serde(default)]
    tags: Vec<String>,
    enforcement_level: EnforcementLevel,
    urn: Urn,
}

impl AnalyzeDiagnostic {
    /// Creates a diagnostic with no description or tags.
    #[must_use]
    pub fn new(
        policy: PolicyIdentity,
        urn: impl Into<Urn>,
        enforcement_level: EnforcementLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            policy,
            description: String::new(),
            message: message.into(),
            tags: Vec::new(),
            enforcement_level,
            urn: urn.into(),
        }
    }

    /// Attaches the policy's static description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attaches classification tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the identity of the producing policy.
    #[must_use]
    pub const fn policy(&self) -> &PolicyIdentity {
        &self.policy
    }

    /// Returns the policy name.
    #[must_use]
    pub const fn policy_name(&self) -> &str {
        self.policy.policy_name()
    }

    /// Returns the static policy description.
    #[must_use]
    pub const fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the instance-specific message.
    #[must_use]
    pub const fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Returns the classification tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the enforcement level.
    #[must_use]
    pub const fn enforcement_level(&self) -> EnforcementLevel {
        self.enforcement_level
    }

    /// Returns the subject resource's URN.
    #[must_use]
    pub const fn urn(&self) -> &Urn {
        &self.urn
    }

    /// Returns how the diagnostic should be presented.
    #[must_use]
    pub const fn disposition(&self) -> Disposition {
        self.enforcement_level.disposition()
    }

    /// Returns `true` when the diagnostic blocks the operation.
    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        self.enforcement_level.is_blocking()
    }
}
