//! The analyzer operation set.
//!
//! [`Analyzer`] is implemented on both sides of the remote boundary: by
//! [`RemoteAnalyzer`](crate::remote::RemoteAnalyzer), a thin stub that
//! forwards every call to a plugin process, and by the in-process policy pack
//! a plugin binary serves through [`host::serve`](crate::host::serve).
//!
//! The trait itself does not police call order. Callers that need the
//! ordering guarantees wrap a handle in an
//! [`AnalyzerSession`](crate::session::AnalyzerSession).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::configuration::AnalyzerConfiguration;
use crate::diagnostic::AnalyzeDiagnostic;
use crate::error::AnalyzerError;
use crate::policy::{AnalyzerInfo, PluginInfo};
use crate::resource::AnalyzerResource;

/// A pluggable resource analyzer.
///
/// Calls on one instance are strictly sequential: every method takes
/// `&mut self`, so overlapping calls are ruled out by the borrow checker.
/// Distinct instances may be driven from different threads.
///
/// # Example
///
/// ```
/// use policy_analyzer::{
///     AnalyzeDiagnostic, Analyzer, AnalyzerConfiguration, AnalyzerError, AnalyzerInfo,
///     AnalyzerResource, PluginInfo,
/// };
///
/// struct Silent;
///
/// impl Analyzer for Silent {
///     fn name(&self) -> &str {
///         "silent"
///     }
///     fn configure(&mut self, _config: &AnalyzerConfiguration) -> Result<(), AnalyzerError> {
///         Ok(())
///     }
///     fn analyze(
///         &mut self,
///         _resource: &AnalyzerResource,
///     ) -> Result<Vec<AnalyzeDiagnostic>, AnalyzerError> {
///         Ok(Vec::new())
///     }
///     fn analyze_stack(
///         &mut self,
///         _resources: &[AnalyzerResource],
///     ) -> Result<Vec<AnalyzeDiagnostic>, AnalyzerError> {
///         Ok(Vec::new())
///     }
///     fn analyzer_info(&mut self) -> Result<AnalyzerInfo, AnalyzerError> {
///         Ok(AnalyzerInfo::new("silent", "Silent"))
///     }
///     fn plugin_info(&mut self) -> Result<PluginInfo, AnalyzerError> {
///         Ok(PluginInfo::new("silent", "0.1.0"))
///     }
///     fn close(&mut self) -> Result<(), AnalyzerError> {
///         Ok(())
///     }
/// }
/// ```
pub trait Analyzer {
    /// Returns the analyzer's qualified name.
    ///
    /// Callable at any point in the analyzer's life, including before
    /// configuration and after a failure.
    fn name(&self) -> &str;

    /// Supplies the run context. Called exactly once, before any analysis.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Configuration`] if the analyzer rejects the
    /// configuration, after which it must only be closed.
    fn configure(&mut self, config: &AnalyzerConfiguration) -> Result<(), AnalyzerError>;

    /// Analyzes one resource before its planned change is applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the analyzer itself failed. Violations found are
    /// reported as diagnostics, not errors.
    fn analyze(
        &mut self,
        resource: &AnalyzerResource,
    ) -> Result<Vec<AnalyzeDiagnostic>, AnalyzerError>;

    /// Analyzes the complete, final resource set once per run.
    ///
    /// # Errors
    ///
    /// Returns an error if the analyzer itself failed.
    fn analyze_stack(
        &mut self,
        resources: &[AnalyzerResource],
    ) -> Result<Vec<AnalyzeDiagnostic>, AnalyzerError>;

    /// Returns metadata about the policy pack.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be retrieved.
    fn analyzer_info(&mut self) -> Result<AnalyzerInfo, AnalyzerError>;

    /// Returns plugin metadata, including its version.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be retrieved.
    fn plugin_info(&mut self) -> Result<PluginInfo, AnalyzerError>;

    /// Releases processes, channels and other resources held by the analyzer.
    ///
    /// # Errors
    ///
    /// Returns an error if release failed. Callers log it and move on.
    fn close(&mut self) -> Result<(), AnalyzerError>;
}

impl<A: Analyzer + ?Sized> Analyzer for Box<A> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn configure(&mut self, config: &AnalyzerConfiguration) -> Result<(), AnalyzerError> {
        (**self).configure(config)
    }

    fn analyze(
        &mut self,
        resource: &AnalyzerResource,
    ) -> Result<Vec<AnalyzeDiagnostic>, AnalyzerError> {
        (**self).analyze(resource)
    }

    fn analyze_stack(
        &mut self,
        resources: &[AnalyzerResource],
    ) -> Result<Vec<AnalyzeDiagnostic>, AnalyzerError> {
        (**self).analyze_stack(resources)
    }

    fn analyzer_info(&mut self) -> Result<AnalyzerInfo, AnalyzerError> {
        (**self).analyzer_info()
    }

    fn plugin_info(&mut self) -> Result<PluginInfo, AnalyzerError> {
        (**self).plugin_info()
    }

    fn close(&mut self) -> Result<(), AnalyzerError> {
        (**self).close()
    }
}

/// Names an operation of the contract for errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// `configure`
    Configure,
    /// `analyze`
    Analyze,
    /// `analyze_stack`
    AnalyzeStack,
    /// `get_analyzer_info`
    GetAnalyzerInfo,
    /// `get_plugin_info`
    GetPluginInfo,
    /// `close`
    Close,
}

impl Operation {
    /// Returns the canonical snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Analyze => "analyze",
            Self::AnalyzeStack => "analyze_stack",
            Self::GetAnalyzerInfo => "get_analyzer_info",
            Self::GetPluginInfo => "get_plugin_info",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
