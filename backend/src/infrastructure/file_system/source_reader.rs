/// Reading raw source documents with encoding fallback
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Source not found: {0}")]
    NotFound(PathBuf),

    #[error("Could not decode {path} with any of: {tried}")]
    Decode { path: PathBuf, tried: String },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type DocumentResult<T> = Result<T, DocumentError>;

/// Byte 0x98 has no character in windows-1251; the WHATWG table passes it
/// through as this C1 control instead of failing.
const WINDOWS_1251_UNDEFINED: char = '\u{98}';

/// Text encodings tried when reading a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    Windows1251,
}

impl SourceEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            SourceEncoding::Utf8 => "utf-8",
            SourceEncoding::Windows1251 => "windows-1251",
        }
    }

    /// Strict decode; `None` when the bytes are not valid in this encoding
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            SourceEncoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_string),
            SourceEncoding::Windows1251 => encoding_rs::WINDOWS_1251
                .decode_without_bom_handling_and_without_replacement(bytes)
                .filter(|text| !text.contains(WINDOWS_1251_UNDEFINED))
                .map(Cow::into_owned),
        }
    }
}

/// Fallback order used when reading documents
pub const DEFAULT_ENCODINGS: &[SourceEncoding] = &[SourceEncoding::Utf8, SourceEncoding::Windows1251];

/// Read a source file, trying each encoding in order until one decodes
pub async fn read_source(path: &Path, encodings: &[SourceEncoding]) -> DocumentResult<String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DocumentError::NotFound(path.to_path_buf())
        } else {
            DocumentError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    decode_bytes(path, &bytes, encodings)
}

fn decode_bytes(path: &Path, bytes: &[u8], encodings: &[SourceEncoding]) -> DocumentResult<String> {
    for encoding in encodings {
        if let Some(text) = encoding.decode(bytes) {
            debug!("Decoded {} as {}", path.display(), encoding.name());
            return Ok(text);
        }
    }

    Err(DocumentError::Decode {
        path: path.to_path_buf(),
        tried: encodings
            .iter()
            .map(|e| e.name())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_utf8() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.txt");
        std::fs::write(&path, "Крейсер «Варяг»").unwrap();

        let text = read_source(&path, DEFAULT_ENCODINGS).await.unwrap();
        assert_eq!(text, "Крейсер «Варяг»");
    }

    #[tokio::test]
    async fn test_read_windows_1251_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.txt");
        // "Варяг" in windows-1251
        std::fs::write(&path, [0xC2, 0xE0, 0xF0, 0xFF, 0xE3]).unwrap();

        let text = read_source(&path, DEFAULT_ENCODINGS).await.unwrap();
        assert_eq!(text, "Варяг");
    }

    #[tokio::test]
    async fn test_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.txt");

        let result = read_source(&path, DEFAULT_ENCODINGS).await;
        assert!(matches!(result, Err(DocumentError::NotFound(p)) if p == path));
    }

    #[tokio::test]
    async fn test_undefined_windows_1251_byte_is_decode_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.txt");
        // Not UTF-8, and 0x98 is unassigned in windows-1251
        std::fs::write(&path, [0xC2, 0x98, 0xFF]).unwrap();

        let result = read_source(&path, DEFAULT_ENCODINGS).await;
        match result {
            Err(DocumentError::Decode { tried, .. }) => assert_eq!(tried, "utf-8, windows-1251"),
            other => panic!("Expected decode error, got {:?}", other),
        }
        assert_eq!(SourceEncoding::Windows1251.decode(&[0xC2, 0x98]), None);
    }

    #[test]
    fn test_decode_error_when_no_encoding_fits() {
        let path = Path::new("doc.txt");
        let result = decode_bytes(path, &[0xC2, 0xE0], &[SourceEncoding::Utf8]);

        match result {
            Err(DocumentError::Decode { tried, .. }) => assert_eq!(tried, "utf-8"),
            other => panic!("Expected decode error, got {:?}", other),
        }
    }
}
