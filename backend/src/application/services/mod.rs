pub mod document_store;
pub mod ingestion_service;
pub mod rag_service;

pub use document_store::{DocumentStore, COLLECTION_DESCRIPTION, DEFAULT_TOPIC_LIMIT};
pub use ingestion_service::{
    IngestionError, IngestionEvent, IngestionResult, IngestionService, IngestionSummary,
    ProgressCallback, DEFAULT_MANIFEST_FILE,
};
pub use rag_service::{
    RagError, RagResult, RagService, RequestState, DEFAULT_RETRIEVAL_K, FALLBACK_ANSWER,
};
