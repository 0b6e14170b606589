//! Reading the analyzer manifests and the resource set from disk.

use std::fs;

use camino::Utf8Path;
use policy_analyzer::{AnalyzerManifest, AnalyzerResource, load_manifests};

use crate::errors::AppError;

fn read(path: &Utf8Path) -> Result<String, AppError> {
    fs::read_to_string(path).map_err(|source| AppError::ReadInput {
        path: path.to_owned(),
        source,
    })
}

/// Loads and validates the manifest list at `path`.
pub(crate) fn read_manifests(path: &Utf8Path) -> Result<Vec<AnalyzerManifest>, AppError> {
    load_manifests(&read(path)?).map_err(|source| AppError::Manifest {
        path: path.to_owned(),
        source,
    })
}

/// Loads the JSON array of resources at `path`.
pub(crate) fn read_resources(path: &Utf8Path) -> Result<Vec<AnalyzerResource>, AppError> {
    serde_json::from_str(&read(path)?).map_err(|source| AppError::ParseResources {
        path: path.to_owned(),
        source,
    })
}
