//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use camino::Utf8PathBuf;
use policy_analyzer::{AnalyzerError, ManifestError, TransportError};
use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to read {path}: {source}")]
    ReadInput { path: Utf8PathBuf, source: io::Error },
    #[error("invalid analyzer manifests in {path}: {source}")]
    Manifest {
        path: Utf8PathBuf,
        source: ManifestError,
    },
    #[error("invalid resources in {path}: {source}")]
    ParseResources {
        path: Utf8PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to launch analyzer '{analyzer}': {source}")]
    Spawn {
        analyzer: String,
        source: TransportError,
    },
    #[error("policy analysis failed: {0}")]
    Analysis(#[from] AnalyzerError),
    #[error("failed to serialise report entry: {0}")]
    EncodeReport(serde_json::Error),
    #[error("failed to write report: {0}")]
    WriteReport(io::Error),
}
