/// Ingestion manifest: which files to load and which URL to cite for each
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Manifest not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error reading manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One `{"file": ..., "url": ...}` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// File name relative to the documents directory
    pub file: String,
    /// Provenance URL stamped onto every chunk of the file
    pub url: String,
}

/// Load and parse a manifest file (a JSON array of entries)
pub async fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>, ManifestError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ManifestError::NotFound(path.to_path_buf())
        } else {
            ManifestError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let entries: Vec<ManifestEntry> =
        serde_json::from_str(&content).map_err(|e| ManifestError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

    info!("Loaded {} entries from manifest {}", entries.len(), path.display());
    debug!("Manifest entries: {:?}", entries);
    Ok(entries)
}
