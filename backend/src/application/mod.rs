pub mod dto;
pub mod repositories;
pub mod services;

// Re-export key types to avoid naming conflicts
pub use dto::{CollectionInfo, CollectionStats, QueryInput, QueryMatch, StoredDocument};
pub use repositories::{VectorStoreBackend, VectorStoreError, VectorStoreResult};
pub use services::{
    DocumentStore, IngestionError, IngestionEvent, IngestionService, IngestionSummary,
    ProgressCallback, RagError, RagService, RequestState,
};
