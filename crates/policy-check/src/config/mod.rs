//! Layered configuration for the policy check.
//!
//! [`Config`] merges built-in defaults, an optional TOML file named by
//! `--config-path`, `POLICY_CHECK_*` environment variables and command-line
//! flags, in increasing order of precedence. Every field is optional on the
//! wire; the accessors fill in the defaults.


use std::ffi::OsString;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use policy_analyzer::{AnalyzerConfiguration, RunOptions, ViolationPolicy};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::errors::AppError;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Stack analysed when none is configured.
pub const DEFAULT_STACK: &str = "dev";

/// Project analysed when none is configured.
pub const DEFAULT_PROJECT: &str = "project";

/// Manifest list read when no plugins path is configured.
pub const DEFAULT_PLUGINS_PATH: &str = "analyzers.json";

/// Resource list read when no resources path is configured.
pub const DEFAULT_RESOURCES_PATH: &str = "resources.json";

/// Supported logging output formats.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Structured JSON suitable for ingestion by logging stacks.
    #[default]
    Json,
    /// Human-readable single line output.
    Compact,
}

/// Settings for one policy check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "POLICY_CHECK")]
pub struct Config {
    /// Tracing filter expression, for example `policy_analyzer=debug`.
    log_filter: Option<String>,
    /// Log output format: `json` or `compact`.
    log_format: Option<LogFormat>,
    /// Name of the stack being deployed.
    stack: Option<String>,
    /// Name of the project owning the stack.
    project: Option<String>,
    /// Whether the operation is a preview.
    dry_run: Option<bool>,
    /// JSON file listing the analyzer plugins to launch.
    plugins_path: Option<Utf8PathBuf>,
    /// JSON file holding the resources to analyse.
    resources_path: Option<Utf8PathBuf>,
    /// Handling of diagnostics that break the contract: `reject` or `discard`.
    violation_policy: Option<ViolationPolicy>,
    /// Whether analyzers run on their own threads.
    concurrent: Option<bool>,
}

impl Config {
    /// Returns the tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Returns the log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_default()
    }

    /// Returns the stack name.
    #[must_use]
    pub fn stack(&self) -> &str {
        self.stack.as_deref().unwrap_or(DEFAULT_STACK)
    }

    /// Returns the project name.
    #[must_use]
    pub fn project(&self) -> &str {
        self.project.as_deref().unwrap_or(DEFAULT_PROJECT)
    }

    /// Returns `true` unless the check was configured for a real update.
    #[must_use]
    pub const fn dry_run(&self) -> bool {
        !matches!(self.dry_run, Some(false))
    }

    /// Returns the path of the analyzer manifest list.
    #[must_use]
    pub fn plugins_path(&self) -> &Utf8Path {
        self.plugins_path
            .as_deref()
            .unwrap_or_else(|| Utf8Path::new(DEFAULT_PLUGINS_PATH))
    }

    /// Returns the path of the resource list.
    #[must_use]
    pub fn resources_path(&self) -> &Utf8Path {
        self.resources_path
            .as_deref()
            .unwrap_or_else(|| Utf8Path::new(DEFAULT_RESOURCES_PATH))
    }

    /// Returns how malformed diagnostics are handled.
    #[must_use]
    pub fn violation_policy(&self) -> ViolationPolicy {
        self.violation_policy.unwrap_or_default()
    }

    /// Returns `true` when analyzers should run concurrently.
    #[must_use]
    pub const fn concurrent(&self) -> bool {
        matches!(self.concurrent, Some(true))
    }

    /// Builds the configuration handed to every analyzer.
    #[must_use]
    pub fn analyzer_configuration(&self) -> AnalyzerConfiguration {
        AnalyzerConfiguration::new(self.stack(), self.project(), self.dry_run())
    }

    /// Builds the run options.
    #[must_use]
    pub fn run_options(&self) -> RunOptions {
        RunOptions::new().with_violation_policy(self.violation_policy())
    }
}

pub(crate) trait ConfigLoader {
    /// Loads configuration from the full argument list, program name first.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}
