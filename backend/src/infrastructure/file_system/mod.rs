pub mod discovery;
pub mod manifest;
pub mod source_reader;

pub use discovery::discover_text_files;
pub use manifest::{load_manifest, ManifestEntry, ManifestError};
pub use source_reader::{
    read_source, DocumentError, DocumentResult, SourceEncoding, DEFAULT_ENCODINGS,
};
