/// Text processing: cleaning and chunking documents
mod text_processor;

pub use text_processor::{
    ProcessedDocument, SourceMetadata, TextProcessor, TextStats, INGESTION_PREFIX,
};
