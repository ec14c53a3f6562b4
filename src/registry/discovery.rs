//! Service definition discovery.
//!
//! Every `*.json` file below the discovery directory becomes one
//! registration request. Files are visited in sorted path order.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::validation::request::{OperationRequest, Target};

/// Request field holding the raw definition text.
pub const DOCUMENT_FIELD: &str = "document";

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery directory {0} does not exist")]
    MissingDirectory(PathBuf),

    #[error("failed to expand glob pattern '{pattern}'")]
    GlobPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// One discovered definition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDocument {
    pub path: PathBuf,
    /// File text, or why it could not be read.
    pub contents: Result<String, String>,
}

impl DiscoveredDocument {
    /// Turn the file into a registration request keyed by its path.
    ///
    /// An unreadable file yields a request without a document, which then
    /// fails validation on its own.
    pub fn into_request(self) -> OperationRequest {
        let request = OperationRequest::new(self.path.display().to_string())
            .with_target(Target::File(self.path));
        match self.contents {
            Ok(text) => request.with_field(DOCUMENT_FIELD, text),
            Err(_) => request,
        }
    }
}

/// Find all `**/*.json` files under `dir`.
pub fn discover(dir: &Path) -> Result<Vec<DiscoveredDocument>, DiscoveryError> {
    if !dir.is_dir() {
        return Err(DiscoveryError::MissingDirectory(dir.to_path_buf()));
    }

    let pattern = format!("{}/**/*.json", glob::Pattern::escape(&dir.to_string_lossy()));
    let entries = glob::glob(&pattern).map_err(|source| DiscoveryError::GlobPattern {
        pattern: pattern.clone(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!(path = %e.path().display(), error = %e, "Skipping unreadable path"),
        }
    }
    paths.sort();

    let documents: Vec<DiscoveredDocument> = paths
        .into_iter()
        .map(|path| {
            let contents = std::fs::read_to_string(&path).map_err(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Service definition unreadable");
                e.to_string()
            });
            DiscoveredDocument { path, contents }
        })
        .collect();

    tracing::info!(dir = %dir.display(), count = documents.len(), "Service definitions discovered");
    Ok(documents)
}
