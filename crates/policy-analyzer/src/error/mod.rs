//! Domain errors raised by analyzer operations.
//!
//! All errors use `thiserror`-derived enums with structured context so callers
//! can inspect the failure programmatically. Every [`AnalyzerError`] names the
//! analyzer it came from. I/O errors are wrapped in `Arc` to satisfy the
//! `result_large_err` Clippy lint.

use std::sync::Arc;

use thiserror::Error;

use crate::analyzer::Operation;
use crate::contract::ContractViolation;
use crate::session::LifecycleState;

/// Broad class of an [`AnalyzerError`].
///
/// Configuration and analysis failures abort the run's analysis phase.
/// Contract violations are rejected diagnostics. Disposal failures are logged
/// and never block completion. Usage errors mean the caller broke the
/// invocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The analyzer rejected its configuration.
    Configuration,
    /// An analysis call failed to complete.
    Analysis,
    /// The analyzer returned structurally invalid results.
    ContractViolation,
    /// Releasing the analyzer failed.
    Disposal,
    /// An operation was invoked out of order.
    Usage,
}

/// Errors arising from analyzer operations.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// The analyzer rejected the supplied configuration.
    #[error("analyzer '{analyzer}' rejected its configuration: {message}")]
    Configuration {
        /// Analyzer name.
        analyzer: String,
        /// Reason given by the analyzer.
        message: String,
    },

    /// The analyzer reported a failure while executing an operation.
    #[error("analyzer '{analyzer}' failed during {operation}: {message}")]
    Analysis {
        /// Analyzer name.
        analyzer: String,
        /// Operation that failed.
        operation: Operation,
        /// Reason given by the analyzer.
        message: String,
    },

    /// The call could not be carried across the remote boundary.
    #[error("transport failure for analyzer '{analyzer}' during {operation}: {source}")]
    Transport {
        /// Analyzer name.
        analyzer: String,
        /// Operation in flight.
        operation: Operation,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// The analyzer returned results that break the contract.
    #[error("analyzer '{analyzer}' violated the contract: {violation}")]
    ContractViolation {
        /// Analyzer name.
        analyzer: String,
        /// The detected violation.
        #[source]
        violation: ContractViolation,
    },

    /// An operation was invoked in a lifecycle state that forbids it.
    #[error("cannot invoke {operation} on analyzer '{analyzer}' while it is {state}")]
    OutOfOrder {
        /// Analyzer name.
        analyzer: String,
        /// Rejected operation.
        operation: Operation,
        /// State the analyzer was in.
        state: LifecycleState,
    },

    /// Two analyzers with the same name were added to one run.
    #[error("analyzer '{analyzer}' is already part of this run")]
    DuplicateAnalyzer {
        /// Analyzer name.
        analyzer: String,
    },

    /// The analyzer failed to release its resources.
    #[error("failed to close analyzer '{analyzer}': {message}")]
    Disposal {
        /// Analyzer name.
        analyzer: String,
        /// Description of the failure.
        message: String,
    },
}

impl AnalyzerError {
    /// Returns the name of the analyzer the error is attributed to.
    #[must_use]
    pub fn analyzer(&self) -> &str {
        match self {
            Self::Configuration { analyzer, .. }
            | Self::Analysis { analyzer, .. }
            | Self::Transport { analyzer, .. }
            | Self::ContractViolation { analyzer, .. }
            | Self::OutOfOrder { analyzer, .. }
            | Self::DuplicateAnalyzer { analyzer }
            | Self::Disposal { analyzer, .. } => analyzer,
        }
    }

    /// Classifies the error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. }
            | Self::Transport {
                operation: Operation::Configure,
                ..
            } => ErrorCategory::Configuration,
            Self::Disposal { .. }
            | Self::Transport {
                operation: Operation::Close,
                ..
            } => ErrorCategory::Disposal,
            Self::Analysis { .. } | Self::Transport { .. } => ErrorCategory::Analysis,
            Self::ContractViolation { .. } => ErrorCategory::ContractViolation,
            Self::OutOfOrder { .. } | Self::DuplicateAnalyzer { .. } => ErrorCategory::Usage,
        }
    }

    /// Returns the analyzer-supplied reason without the attribution prefix.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::Configuration { message, .. }
            | Self::Analysis { message, .. }
            | Self::Disposal { message, .. } => message.clone(),
            Self::Transport { source, .. } => source.to_string(),
            Self::ContractViolation { violation, .. } => violation.to_string(),
            other => other.to_string(),
        }
    }
}

/// Failures below the contract: spawning, framing and stream I/O.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The analyzer process could not be spawned.
    #[error("failed to start analyzer process: {message}")]
    Spawn {
        /// Human-readable failure description.
        message: String,
        /// Optional underlying I/O error.
        #[source]
        source: Option<Arc<std::io::Error>>,
    },

    /// An I/O error occurred on the analyzer's streams.
    #[error("I/O error communicating with analyzer: {source}")]
    Io {
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// A request could not be serialised.
    #[error("failed to serialise analyzer request: {source}")]
    Serialize {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A response could not be deserialised.
    #[error("failed to deserialise analyzer response: {message}")]
    Deserialize {
        /// Human-readable description of the parse failure.
        message: String,
        /// Optional underlying JSON error.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The analyzer produced output that does not follow the protocol.
    #[error("analyzer wrote invalid output: {message}")]
    InvalidOutput {
        /// Description of the protocol violation.
        message: String,
    },

    /// The analyzer's output stream ended before a response arrived.
    #[error("analyzer closed its output stream")]
    Closed,

    /// The analyzer process exited with a non-zero status.
    #[error("analyzer exited with non-zero status {status}")]
    NonZeroExit {
        /// Process exit status.
        status: i32,
    },

    /// The analyzer process did not exit within its shutdown grace period.
    #[error("analyzer did not exit within {timeout_secs}s and was killed")]
    Timeout {
        /// Configured grace period in seconds.
        timeout_secs: u64,
    },
}

impl From<std::io::Error> for TransportError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source: Arc::new(source),
        }
    }
}

/// Errors raised while loading analyzer manifests.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest document could not be parsed.
    #[error("failed to parse analyzer manifests: {source}")]
    Parse {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A manifest failed validation.
    #[error("invalid manifest for analyzer '{name}': {message}")]
    Invalid {
        /// Analyzer name as written in the manifest.
        name: String,
        /// Description of the validation failure.
        message: String,
    },

    /// Two manifests share a name.
    #[error("analyzer '{name}' is declared more than once")]
    Duplicate {
        /// Duplicated name.
        name: String,
    },
}
