use async_trait::async_trait;
use thiserror::Error;

use crate::application::dto::{CollectionInfo, QueryMatch, StoredDocument};
use crate::domain::base::DomainError;
use crate::domain::entities::VectorRecord;
use crate::domain::value_objects::{CollectionName, EmbeddingVector, MetadataFilter};
use crate::infrastructure::embeddings::EmbeddingError;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector store backend error: {0:#}")]
    Backend(#[source] anyhow::Error),

    #[error("Got {texts} texts but {metadatas} metadata entries")]
    LengthMismatch { texts: usize, metadatas: usize },

    #[error("Got {texts} texts but {ids} ids")]
    IdCountMismatch { texts: usize, ids: usize },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

pub type VectorStoreResult<T> = Result<T, VectorStoreError>;

/// Storage seam for vector records.
///
/// Implementations hold any number of named collections, each with a fixed
/// vector size and cosine distance. Operations on a collection that does not
/// exist behave as if it were empty; only `ensure_collection` creates one.
/// Implementations must be safe to share between concurrent callers.
#[async_trait]
pub trait VectorStoreBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Create the collection if missing. Returns `true` when it was created.
    async fn ensure_collection(
        &self,
        collection: &CollectionName,
        dimension_count: usize,
    ) -> VectorStoreResult<bool>;

    /// `None` when the collection does not exist
    async fn collection_info(
        &self,
        collection: &CollectionName,
    ) -> VectorStoreResult<Option<CollectionInfo>>;

    /// Insert records, replacing any with the same id
    async fn upsert(
        &self,
        collection: &CollectionName,
        records: Vec<VectorRecord>,
    ) -> VectorStoreResult<()>;

    /// Up to `limit` records matching `filter`, nearest first
    async fn search(
        &self,
        collection: &CollectionName,
        query: &EmbeddingVector,
        limit: usize,
        filter: &MetadataFilter,
    ) -> VectorStoreResult<Vec<QueryMatch>>;

    /// Up to `limit` records matching `filter`, in storage order
    async fn scroll(
        &self,
        collection: &CollectionName,
        filter: &MetadataFilter,
        limit: usize,
    ) -> VectorStoreResult<Vec<StoredDocument>>;

    async fn count(
        &self,
        collection: &CollectionName,
        filter: &MetadataFilter,
    ) -> VectorStoreResult<usize>;

    /// Drop the collection. Returns `false` when it did not exist.
    async fn delete_collection(&self, collection: &CollectionName) -> VectorStoreResult<bool>;
}
