//! Declarations of analyzer plugins the engine can launch.
//!
//! An [`AnalyzerManifest`] names an analyzer and the executable that serves
//! it. The analyzer's qualified name is taken from the manifest rather than
//! from the plugin, so errors can be attributed even when the plugin never
//! answers. Manifests are loaded from a JSON array.


use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

/// Default grace period, in seconds, for a plugin to exit after `close`.
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

const fn default_shutdown_timeout_secs() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_SECS
}

/// How to launch one analyzer plugin.
///
/// # Example
///
/// ```
/// use policy_analyzer::AnalyzerManifest;
///
/// let manifest = AnalyzerManifest::new("baseline", "0.1.0", "/usr/bin/baseline")
///     .with_args(vec!["--strict".into()]);
/// assert_eq!(manifest.shutdown_timeout_secs(), 5);
/// assert!(manifest.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerManifest {
    name: String,
    version: String,
    executable: PathBuf,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default = "default_shutdown_timeout_secs")]
    shutdown_timeout_secs: u64,
}

impl AnalyzerManifest {
    /// Creates a manifest with no arguments and the default grace period.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        executable: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            executable: executable.into(),
            args: Vec::new(),
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }

    /// Sets the arguments passed to the executable.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Overrides the shutdown grace period.
    #[must_use]
    pub const fn with_shutdown_timeout_secs(mut self, shutdown_timeout_secs: u64) -> Self {
        self.shutdown_timeout_secs = shutdown_timeout_secs;
        self
    }

    /// Checks that the manifest can be launched.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Invalid`] if the name is blank or the
    /// executable path is not absolute.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.name.trim().is_empty() {
            return Err(ManifestError::Invalid {
                name: self.name.clone(),
                message: String::from("analyzer name must not be empty"),
            });
        }
        if !self.executable.is_absolute() {
            return Err(ManifestError::Invalid {
                name: self.name.clone(),
                message: format!(
                    "executable must be an absolute path, got '{}'",
                    self.executable.display()
                ),
            });
        }
        Ok(())
    }

    /// Returns the analyzer's qualified name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the declared plugin version.
    #[must_use]
    pub const fn version(&self) -> &str {
        self.version.as_str()
    }

    /// Returns the executable path.
    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Returns the executable arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the shutdown grace period in seconds.
    #[must_use]
    pub const fn shutdown_timeout_secs(&self) -> u64 {
        self.shutdown_timeout_secs
    }
}

/// Parses and validates a JSON array of manifests.
///
/// # Errors
///
/// Returns [`ManifestError::Parse`] for malformed JSON,
/// [`ManifestError::Invalid`] for a manifest that fails validation, and
/// [`ManifestError::Duplicate`] when two manifests share a name.
pub fn load_manifests(json: &str) -> Result<Vec<AnalyzerManifest>, ManifestError> {
    let manifests: Vec<AnalyzerManifest> =
        serde_json::from_str(json).map_err(|source| ManifestError::Parse { source })?;
    let mut seen = HashSet::new();
    for manifest in &manifests {
        manifest.validate()?;
        if !seen.insert(manifest.name()) {
            return Err(ManifestError::Duplicate {
                name: manifest.name.clone(),
            });
        }
    }
    Ok(manifests)
}
