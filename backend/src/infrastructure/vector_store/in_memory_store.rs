/// Process-local vector store with brute-force cosine search
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::application::dto::{CollectionInfo, QueryMatch, StoredDocument};
use crate::application::repositories::{VectorStoreBackend, VectorStoreResult};
use crate::domain::base::{DomainError, Entity};
use crate::domain::entities::VectorRecord;
use crate::domain::value_objects::{CollectionName, EmbeddingVector, MetadataFilter, RecordId};

/// Nothing is persisted; collections disappear with the process.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<CollectionName, MemoryCollection>>,
}

struct MemoryCollection {
    dimension_count: usize,
    /// Insertion order; replaced records keep their slot
    records: Vec<VectorRecord>,
    positions: HashMap<RecordId, usize>,
}

impl MemoryCollection {
    fn new(dimension_count: usize) -> Self {
        MemoryCollection {
            dimension_count,
            records: Vec::new(),
            positions: HashMap::new(),
        }
    }

    fn check_dimensions(&self, vector: &EmbeddingVector) -> Result<(), DomainError> {
        if vector.dimension_count() != self.dimension_count {
            return Err(DomainError::DimensionMismatch {
                expected: self.dimension_count,
                actual: vector.dimension_count(),
            });
        }
        Ok(())
    }

    fn matching<'a>(
        &'a self,
        filter: &'a MetadataFilter,
    ) -> impl Iterator<Item = &'a VectorRecord> + 'a {
        self.records.iter().filter(move |record| {
            filter.is_empty() || filter.matches(&record.metadata().to_fields())
        })
    }
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        InMemoryVectorStore {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStoreBackend for InMemoryVectorStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ensure_collection(
        &self,
        collection: &CollectionName,
        dimension_count: usize,
    ) -> VectorStoreResult<bool> {
        let mut collections = self.collections.write();
        if collections.contains_key(collection) {
            return Ok(false);
        }

        collections.insert(collection.clone(), MemoryCollection::new(dimension_count));
        info!(
            "Created in-memory collection '{}' with {} dimensions",
            collection, dimension_count
        );
        Ok(true)
    }

    async fn collection_info(
        &self,
        collection: &CollectionName,
    ) -> VectorStoreResult<Option<CollectionInfo>> {
        let collections = self.collections.read();
        Ok(collections.get(collection).map(|col| CollectionInfo {
            name: collection.to_string(),
            points_count: col.records.len(),
            dimension_count: col.dimension_count,
        }))
    }

    async fn upsert(
        &self,
        collection: &CollectionName,
        records: Vec<VectorRecord>,
    ) -> VectorStoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut collections = self.collections.write();
        let dimension_count = records
            .first()
            .map(|r| r.embedding().dimension_count())
            .unwrap_or_default();
        let col = collections
            .entry(collection.clone())
            .or_insert_with(|| MemoryCollection::new(dimension_count));

        // Validate everything before touching the collection
        for record in &records {
            col.check_dimensions(record.embedding())?;
        }

        debug!("Upserting {} records into '{}'", records.len(), collection);
        for record in records {
            match col.positions.get(record.id()) {
                Some(&position) => col.records[position] = record,
                None => {
                    col.positions.insert(record.id().clone(), col.records.len());
                    col.records.push(record);
                }
            }
        }

        Ok(())
    }

    async fn search(
        &self,
        collection: &CollectionName,
        query: &EmbeddingVector,
        limit: usize,
        filter: &MetadataFilter,
    ) -> VectorStoreResult<Vec<QueryMatch>> {
        let collections = self.collections.read();
        let Some(col) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        if col.records.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        col.check_dimensions(query)?;

        let mut matches = col
            .matching(filter)
            .map(|record| {
                Ok(QueryMatch {
                    id: record.id().clone(),
                    text: record.text().to_string(),
                    metadata: record.metadata().clone(),
                    distance: query.cosine_distance(record.embedding())?,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        // Stable sort keeps insertion order between equal distances
        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn scroll(
        &self,
        collection: &CollectionName,
        filter: &MetadataFilter,
        limit: usize,
    ) -> VectorStoreResult<Vec<StoredDocument>> {
        let collections = self.collections.read();
        let Some(col) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(col
            .matching(filter)
            .take(limit)
            .map(|record| StoredDocument {
                id: record.id().clone(),
                text: record.text().to_string(),
                metadata: record.metadata().clone(),
            })
            .collect())
    }

    async fn count(
        &self,
        collection: &CollectionName,
        filter: &MetadataFilter,
    ) -> VectorStoreResult<usize> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .map(|col| col.matching(filter).count())
            .unwrap_or(0))
    }

    async fn delete_collection(&self, collection: &CollectionName) -> VectorStoreResult<bool> {
        let removed = self.collections.write().remove(collection).is_some();
        if removed {
            info!("Deleted in-memory collection '{}'", collection);
        }
        Ok(removed)
    }
}
