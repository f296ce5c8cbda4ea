/// File discovery utilities for finding source documents
use std::path::{Path, PathBuf};
use tokio::fs;

/// Discover all files with the given extension directly inside `dir`.
/// Not recursive; results are sorted so ingestion order is stable.
pub async fn discover_text_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        // Skip hidden files such as editor swap files
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(true);
        if hidden {
            continue;
        }

        if path.extension().and_then(|e| e.to_str()) == Some(extension) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
