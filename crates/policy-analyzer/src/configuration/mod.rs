//! Configuration handshake sent to an analyzer before any analysis.

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

use crate::error::AnalyzerError;

/// Context of the analysis run.
///
/// Sent exactly once per analyzer instance, before the first `analyze` or
/// `analyze_stack` call.
///
/// # Example
///
/// ```
/// use policy_analyzer::AnalyzerConfiguration;
///
/// let config = AnalyzerConfiguration::new("prod", "infra", true);
/// assert!(config.is_dry_run());
/// assert!(config.validate("baseline").is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerConfiguration {
    stack_name: String,
    project_name: String,
    #[serde(default)]
    dry_run: bool,
}

impl AnalyzerConfiguration {
    /// Creates a configuration.
    #[must_use]
    pub fn new(
        stack_name: impl Into<String>,
        project_name: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        Self {
            stack_name: stack_name.into(),
            project_name: project_name.into(),
            dry_run,
        }
    }

    /// Returns the stack name.
    #[must_use]
    pub const fn stack_name(&self) -> &str {
        self.stack_name.as_str()
    }

    /// Returns the project name.
    #[must_use]
    pub const fn project_name(&self) -> &str {
        self.project_name.as_str()
    }

    /// Returns `true` when the operation is a preview.
    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Rejects configurations missing the stack or project context.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Configuration`] attributed to `analyzer` when
    /// the stack or project name is blank.
    pub fn validate(&self, analyzer: &str) -> Result<(), AnalyzerError> {
        let field = if self.stack_name.trim().is_empty() {
            "stack name"
        } else if self.project_name.trim().is_empty() {
            "project name"
        } else {
            return Ok(());
        };
        Err(AnalyzerError::Configuration {
            analyzer: analyzer.to_owned(),
            message: format!("{field} must not be empty"),
        })
    }
}
