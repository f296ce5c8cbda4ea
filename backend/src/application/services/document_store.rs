/// Collection-level document store: embeds texts and delegates storage
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::dto::{CollectionStats, QueryInput, QueryMatch, StoredDocument};
use crate::application::repositories::{VectorStoreBackend, VectorStoreError, VectorStoreResult};
use crate::domain::entities::{ChunkMetadata, VectorRecord};
use crate::domain::value_objects::{CollectionName, MetadataFilter, RecordId};
use crate::infrastructure::embeddings::{EmbeddingError, EmbeddingProvider};

pub const COLLECTION_DESCRIPTION: &str = "Historical documents collection";
pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 32;
pub const DEFAULT_TOPIC_LIMIT: usize = 100;

/// Named collections of embedded texts.
///
/// Collections are created on first reference with the embedding provider's
/// vector size. Every record gets a fresh random id unless the caller supplies
/// one, so storing the same text twice yields two records.
pub struct DocumentStore {
    backend: Arc<dyn VectorStoreBackend>,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl DocumentStore {
    pub fn new(backend: Arc<dyn VectorStoreBackend>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        DocumentStore {
            backend,
            embedder,
            batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
        }
    }

    /// Number of texts sent to the embedding provider per call
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn backend(&self) -> &Arc<dyn VectorStoreBackend> {
        &self.backend
    }

    /// Create the collection if it does not exist yet
    pub async fn get_or_create_collection(&self, collection: &CollectionName) -> VectorStoreResult<()> {
        if self
            .backend
            .ensure_collection(collection, self.embedder.dimension_count())
            .await?
        {
            info!(
                "Created collection '{}' ({} backend, {} embeddings)",
                collection,
                self.backend.name(),
                self.embedder.name()
            );
        }
        Ok(())
    }

    /// Embed and store `texts`, one metadata entry per text.
    ///
    /// Ids are generated when `ids` is `None`; records with an existing id are
    /// replaced. Nothing is stored if embedding fails. Returns the ids used.
    pub async fn upsert(
        &self,
        collection: &CollectionName,
        texts: Vec<String>,
        metadatas: Vec<ChunkMetadata>,
        ids: Option<Vec<RecordId>>,
    ) -> VectorStoreResult<Vec<RecordId>> {
        if texts.len() != metadatas.len() {
            return Err(VectorStoreError::LengthMismatch {
                texts: texts.len(),
                metadatas: metadatas.len(),
            });
        }
        let ids = match ids {
            Some(ids) if ids.len() != texts.len() => {
                return Err(VectorStoreError::IdCountMismatch {
                    texts: texts.len(),
                    ids: ids.len(),
                })
            }
            Some(ids) => ids,
            None => texts.iter().map(|_| RecordId::generate()).collect(),
        };
        if texts.is_empty() {
            return Ok(ids);
        }

        self.get_or_create_collection(collection).await?;

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!("Embedding batch of {} texts", batch.len());
            embeddings.extend(self.embedder.embed(batch).await?);
        }
        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: embeddings.len(),
            }
            .into());
        }

        let records: Vec<VectorRecord> = ids
            .iter()
            .cloned()
            .zip(texts)
            .zip(embeddings)
            .zip(metadatas)
            .map(|(((id, text), embedding), metadata)| {
                VectorRecord::new(id, text, embedding, metadata)
            })
            .collect();

        let count = records.len();
        self.backend.upsert(collection, records).await?;
        info!("Stored {} documents in collection '{}'", count, collection);

        Ok(ids)
    }

    /// Store texts under freshly generated ids
    pub async fn add_documents(
        &self,
        collection: &CollectionName,
        texts: Vec<String>,
        metadatas: Vec<ChunkMetadata>,
    ) -> VectorStoreResult<Vec<RecordId>> {
        self.upsert(collection, texts, metadatas, None).await
    }

    /// Up to `k` records nearest to the query, closest first.
    ///
    /// Text queries are embedded with this store's provider; vector queries are
    /// used as given. An empty or new collection yields no matches.
    pub async fn query(
        &self,
        collection: &CollectionName,
        input: impl Into<QueryInput>,
        k: usize,
        filter: &MetadataFilter,
    ) -> VectorStoreResult<Vec<QueryMatch>> {
        self.get_or_create_collection(collection).await?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = match input.into() {
            QueryInput::Text(text) => {
                debug!("Embedding query text ({} chars)", text.chars().count());
                self.embedder.embed_query(&text).await?
            }
            QueryInput::Vector(vector) => vector,
        };

        let matches = self.backend.search(collection, &vector, k, filter).await?;
        debug!("Query on '{}' returned {} matches", collection, matches.len());
        Ok(matches)
    }

    pub async fn stats(&self, collection: &CollectionName) -> VectorStoreResult<CollectionStats> {
        self.get_or_create_collection(collection).await?;

        let info = self.backend.collection_info(collection).await?;
        let (count, dimension_count) = info
            .map(|i| (i.points_count, i.dimension_count))
            .unwrap_or((0, self.embedder.dimension_count()));

        let mut metadata = BTreeMap::new();
        metadata.insert("description".to_string(), COLLECTION_DESCRIPTION.to_string());
        metadata.insert("distance".to_string(), "cosine".to_string());
        metadata.insert("dimension".to_string(), dimension_count.to_string());

        Ok(CollectionStats {
            name: collection.to_string(),
            count,
            metadata,
        })
    }

    /// Drop the collection and all its records. Deleting a collection that
    /// does not exist is not an error; returns whether anything was removed.
    pub async fn delete(&self, collection: &CollectionName) -> VectorStoreResult<bool> {
        let removed = self.backend.delete_collection(collection).await?;
        if removed {
            info!("Deleted collection '{}'", collection);
        } else {
            warn!("Collection '{}' does not exist, nothing to delete", collection);
        }
        Ok(removed)
    }

    /// Whether any record's `path` equals `source`
    pub async fn exists_by_source(
        &self,
        collection: &CollectionName,
        source: &str,
    ) -> VectorStoreResult<bool> {
        let filter = MetadataFilter::new().field_eq(ChunkMetadata::PATH, source);
        Ok(self.backend.count(collection, &filter).await? > 0)
    }

    /// Distinct topics in the collection, sorted
    pub async fn unique_topics(&self, collection: &CollectionName) -> VectorStoreResult<Vec<String>> {
        let all = MetadataFilter::new();
        let total = self.backend.count(collection, &all).await?;
        let documents = self.backend.scroll(collection, &all, total).await?;

        let topics: BTreeSet<String> = documents
            .into_iter()
            .map(|doc| doc.metadata.topic)
            .filter(|topic| !topic.is_empty())
            .collect();
        Ok(topics.into_iter().collect())
    }

    pub async fn documents_by_topic(
        &self,
        collection: &CollectionName,
        topic: &str,
        limit: usize,
    ) -> VectorStoreResult<Vec<StoredDocument>> {
        let filter = MetadataFilter::new().field_eq(ChunkMetadata::TOPIC, topic);
        self.backend.scroll(collection, &filter, limit).await
    }
}
