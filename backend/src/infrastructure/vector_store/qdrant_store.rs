/// Qdrant vector store backend
use anyhow::{Context, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use parking_lot::RwLock;
use qdrant_client::qdrant::{
    vectors_config, CollectionExistsRequest, Condition, CountPointsBuilder, CreateCollectionBuilder, Distance, Filter,
    PointId, PointStruct, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, Value,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::dto::{CollectionInfo, QueryMatch, StoredDocument};
use crate::application::repositories::{VectorStoreBackend, VectorStoreError, VectorStoreResult};
use crate::domain::base::Entity;
use crate::domain::entities::{ChunkMetadata, VectorRecord};
use crate::domain::value_objects::{
    CollectionName, EmbeddingVector, MetadataFilter, MetadataValue, RecordId,
};

const TEXT_KEY: &str = "text";
const RECORD_ID_KEY: &str = "record_id";

/// Vector store backed by a Qdrant server, cosine distance
pub struct QdrantVectorStore {
    client: Qdrant,
    /// Collections this store has seen on the server. Dropped on delete.
    known_collections: RwLock<HashSet<CollectionName>>,
}

impl QdrantVectorStore {
    /// Connect to a Qdrant server (e.g. "http://localhost:6334")
    pub fn new(url: &str) -> Result<Self> {
        info!("Connecting to Qdrant at {}", url);

        let client = Qdrant::from_url(url)
            .build()
            .context("Failed to connect to Qdrant")?;

        Ok(QdrantVectorStore {
            client,
            known_collections: RwLock::new(HashSet::new()),
        })
    }

    pub fn new_local() -> Result<Self> {
        Self::new("http://localhost:6334")
    }

    async fn collection_exists(&self, collection: &CollectionName) -> Result<bool> {
        if self.known_collections.read().contains(collection) {
            return Ok(true);
        }

        let exists = self
            .client
            .collection_exists(CollectionExistsRequest {
                collection_name: collection.to_string(),
            })
            .await
            .context("Failed to check collection existence")?;
        if exists {
            self.known_collections.write().insert(collection.clone());
        }
        Ok(exists)
    }
}

/// Qdrant only accepts UUIDs or integers as point ids
fn point_id(id: &RecordId) -> String {
    match Uuid::parse_str(id.as_str()) {
        Ok(uuid) => uuid.to_string(),
        Err(_) => Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_str().as_bytes()).to_string(),
    }
}

fn to_filter(filter: &MetadataFilter) -> Option<Filter> {
    if filter.is_empty() {
        return None;
    }

    let conditions: Vec<Condition> = filter
        .conditions()
        .iter()
        .map(|(key, value)| match value {
            MetadataValue::Text(text) => Condition::matches(key.clone(), text.clone()),
            MetadataValue::Integer(number) => Condition::matches(key.clone(), *number),
        })
        .collect();
    Some(Filter::must(conditions))
}

fn to_payload(record: &VectorRecord) -> HashMap<String, Value> {
    let mut payload: HashMap<String, Value> = record
        .metadata()
        .to_fields()
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                MetadataValue::Text(text) => Value::from(text),
                MetadataValue::Integer(number) => Value::from(number),
            };
            (key, value)
        })
        .collect();
    payload.insert(TEXT_KEY.to_string(), Value::from(record.text().to_string()));
    payload.insert(
        RECORD_ID_KEY.to_string(),
        Value::from(record.id().as_str().to_string()),
    );
    payload
}

/// Split a stored payload back into record id, text, and metadata
fn from_payload(
    point_id: Option<PointId>,
    payload: HashMap<String, Value>,
) -> VectorStoreResult<(RecordId, String, ChunkMetadata)> {
    let mut fields = BTreeMap::new();
    let mut text = String::new();
    let mut record_id = None;

    for (key, value) in payload {
        match key.as_str() {
            TEXT_KEY => text = value.as_str().cloned().unwrap_or_default(),
            RECORD_ID_KEY => record_id = value.as_str().cloned(),
            _ => {
                if let Some(s) = value.as_str() {
                    fields.insert(key, MetadataValue::Text(s.clone()));
                } else if let Some(i) = value.as_integer() {
                    fields.insert(key, MetadataValue::Integer(i));
                }
            }
        }
    }

    let record_id = match record_id {
        Some(id) => id,
        None => match point_id.and_then(|p| p.point_id_options) {
            Some(PointIdOptions::Uuid(uuid)) => uuid,
            Some(PointIdOptions::Num(num)) => num.to_string(),
            None => String::new(),
        },
    };

    Ok((
        RecordId::new(record_id)?,
        text,
        ChunkMetadata::from_fields(&fields),
    ))
}

#[async_trait]
impl VectorStoreBackend for QdrantVectorStore {
    fn name(&self) -> &'static str {
        "qdrant"
    }

    async fn ensure_collection(
        &self,
        collection: &CollectionName,
        dimension_count: usize,
    ) -> VectorStoreResult<bool> {
        if self
            .collection_exists(collection)
            .await
            .map_err(VectorStoreError::Backend)?
        {
            debug!("Collection '{}' already exists", collection);
            return Ok(false);
        }

        let created = self
            .client
            .create_collection(
                CreateCollectionBuilder::new(collection.as_str()).vectors_config(
                    VectorParamsBuilder::new(dimension_count as u64, Distance::Cosine),
                ),
            )
            .await
            .context("Failed to create collection");

        if let Err(e) = created {
            // Another caller may have created it between the check and the create
            if self
                .collection_exists(collection)
                .await
                .map_err(VectorStoreError::Backend)?
            {
                warn!("Collection '{}' was created concurrently: {:#}", collection, e);
                return Ok(false);
            }
            return Err(VectorStoreError::Backend(e));
        }
        self.known_collections.write().insert(collection.clone());

        info!(
            "Created collection '{}' with {} dimensions",
            collection, dimension_count
        );
        Ok(true)
    }

    async fn collection_info(
        &self,
        collection: &CollectionName,
    ) -> VectorStoreResult<Option<CollectionInfo>> {
        if !self
            .collection_exists(collection)
            .await
            .map_err(VectorStoreError::Backend)?
        {
            return Ok(None);
        }

        let info = self
            .client
            .collection_info(collection.as_str())
            .await
            .context("Failed to get collection info")
            .map_err(VectorStoreError::Backend)?;

        Ok(info.result.map(|result| {
            let dimension_count = result
                .config
                .and_then(|c| c.params)
                .and_then(|p| p.vectors_config)
                .and_then(|v| match v.config {
                    Some(vectors_config::Config::Params(params)) => Some(params.size as usize),
                    _ => None,
                })
                .unwrap_or(0);
            CollectionInfo {
                name: collection.to_string(),
                points_count: result.points_count.unwrap_or(0) as usize,
                dimension_count,
            }
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

        debug!("Upserting batch of {} points into '{}'", records.len(), collection);

        let points: Vec<PointStruct> = records
            .iter()
            .map(|record| {
                PointStruct::new(
                    point_id(record.id()),
                    record.embedding().dimensions().to_vec(),
                    to_payload(record),
                )
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection.as_str(), points).wait(true))
            .await
            .context("Failed to upsert points")
            .map_err(VectorStoreError::Backend)?;

        Ok(())
    }

    async fn search(
        &self,
        collection: &CollectionName,
        query: &EmbeddingVector,
        limit: usize,
        filter: &MetadataFilter,
    ) -> VectorStoreResult<Vec<QueryMatch>> {
        if limit == 0
            || !self
                .collection_exists(collection)
                .await
                .map_err(VectorStoreError::Backend)?
        {
            return Ok(Vec::new());
        }

        debug!("Searching '{}' with limit {}", collection, limit);

        let mut builder =
            SearchPointsBuilder::new(collection.as_str(), query.dimensions().to_vec(), limit as u64)
                .with_payload(true);
        if let Some(filter) = to_filter(filter) {
            builder = builder.filter(filter);
        }

        let response = self
            .client
            .search_points(builder)
            .await
            .context("Search failed")
            .map_err(VectorStoreError::Backend)?;

        let matches = response
            .result
            .into_iter()
            .map(|point| {
                let (id, text, metadata) = from_payload(point.id, point.payload)?;
                Ok(QueryMatch {
                    id,
                    text,
                    metadata,
                    distance: 1.0 - point.score,
                })
            })
            .collect::<VectorStoreResult<Vec<_>>>()?;

        debug!("Found {} results", matches.len());
        Ok(matches)
    }

    async fn scroll(
        &self,
        collection: &CollectionName,
        filter: &MetadataFilter,
        limit: usize,
    ) -> VectorStoreResult<Vec<StoredDocument>> {
        if limit == 0
            || !self
                .collection_exists(collection)
                .await
                .map_err(VectorStoreError::Backend)?
        {
            return Ok(Vec::new());
        }

        let mut builder = ScrollPointsBuilder::new(collection.as_str())
            .limit(limit.min(u32::MAX as usize) as u32)
            .with_payload(true)
            .with_vectors(false);
        if let Some(filter) = to_filter(filter) {
            builder = builder.filter(filter);
        }

        let response = self
            .client
            .scroll(builder)
            .await
            .context("Scroll failed")
            .map_err(VectorStoreError::Backend)?;

        response
            .result
            .into_iter()
            .map(|point| {
                let (id, text, metadata) = from_payload(point.id, point.payload)?;
                Ok(StoredDocument { id, text, metadata })
            })
            .collect()
    }

    async fn count(
        &self,
        collection: &CollectionName,
        filter: &MetadataFilter,
    ) -> VectorStoreResult<usize> {
        if !self
            .collection_exists(collection)
            .await
            .map_err(VectorStoreError::Backend)?
        {
            return Ok(0);
        }

        let mut builder = CountPointsBuilder::new(collection.as_str()).exact(true);
        if let Some(filter) = to_filter(filter) {
            builder = builder.filter(filter);
        }

        let response = self
            .client
            .count(builder)
            .await
            .context("Count failed")
            .map_err(VectorStoreError::Backend)?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    async fn delete_collection(&self, collection: &CollectionName) -> VectorStoreResult<bool> {
        if !self
            .collection_exists(collection)
            .await
            .map_err(VectorStoreError::Backend)?
        {
            return Ok(false);
        }

        self.known_collections.write().remove(collection);
        self.client
            .delete_collection(collection.as_str())
            .await
            .context("Failed to delete collection")
            .map_err(VectorStoreError::Backend)?;
        info!("Deleted collection: {}", collection);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tests marked #[ignore] need a running Qdrant instance:
    // docker run -p 6333:6333 -p 6334:6334 qdrant/qdrant

    fn test_collection() -> CollectionName {
        CollectionName::new(format!("test_collection_{}", Uuid::new_v4())).unwrap()
    }

    fn record(id: &str, text: &str, topic: &str, value: f32) -> VectorRecord {
        VectorRecord::new(
            RecordId::new(id).unwrap(),
            text,
            EmbeddingVector::new(vec![value, 1.0 - value, 0.5, 0.25]).unwrap(),
            ChunkMetadata::for_text(format!("cleaned_{}_1.txt", topic), topic, text),
        )
    }

    #[test]
    fn test_point_id_is_stable_uuid() {
        let id = RecordId::new("chunk-7").unwrap();
        let first = point_id(&id);
        assert_eq!(first, point_id(&id));
        assert!(Uuid::parse_str(&first).is_ok());

        let uuid = RecordId::generate();
        assert_eq!(point_id(&uuid), uuid.as_str());
    }

    #[test]
    fn test_payload_round_trip() {
        let original = record("chunk-1", "Крейсер Варяг", "varyag", 0.1);
        let payload = to_payload(&original);

        assert_eq!(payload.len(), ChunkMetadata::for_text("", "", "").to_fields().len() + 2);

        let (id, text, metadata) = from_payload(None, payload).unwrap();
        assert_eq!(id.as_str(), "chunk-1");
        assert_eq!(text, "Крейсер Варяг");
        assert_eq!(&metadata, original.metadata());
    }

    #[test]
    fn test_empty_filter_is_none() {
        assert!(to_filter(&MetadataFilter::new()).is_none());
        assert!(to_filter(&MetadataFilter::new().field_eq("topic", "varyag")).is_some());
    }

    #[tokio::test]
    #[ignore] // Requires running Qdrant instance
    async fn test_create_and_info() {
        let store = QdrantVectorStore::new_local().unwrap();
        let collection = test_collection();

        assert!(store.ensure_collection(&collection, 4).await.unwrap());
        assert!(!store.ensure_collection(&collection, 4).await.unwrap());

        let info = store.collection_info(&collection).await.unwrap().unwrap();
        assert_eq!(info.points_count, 0);
        assert_eq!(info.dimension_count, 4);

        assert!(store.delete_collection(&collection).await.unwrap());
        assert!(!store.delete_collection(&collection).await.unwrap());
    }

    #[tokio::test]
    #[ignore] // Requires running Qdrant instance
    async fn test_upsert_search_and_filter() {
        let store = QdrantVectorStore::new_local().unwrap();
        let collection = test_collection();
        store.ensure_collection(&collection, 4).await.unwrap();

        store
            .upsert(
                &collection,
                vec![
                    record("a", "Варяг", "varyag", 0.9),
                    record("b", "Цусима", "tsushima", 0.1),
                ],
            )
            .await
            .unwrap();

        let query = EmbeddingVector::new(vec![0.9, 0.1, 0.5, 0.25]).unwrap();
        let results = store
            .search(&collection, &query, 2, &MetadataFilter::new())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id.as_str(), "a");
        assert!(results[0].distance <= results[1].distance);

        let filter = MetadataFilter::new().field_eq(ChunkMetadata::TOPIC, "tsushima");
        assert_eq!(store.count(&collection, &filter).await.unwrap(), 1);

        let docs = store.scroll(&collection, &filter, 10).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "Цусима");

        let _ = store.delete_collection(&collection).await;
    }

    #[tokio::test]
    #[ignore] // Requires running Qdrant instance
    async fn test_concurrent_ensure_collection() {
        let first = QdrantVectorStore::new_local().unwrap();
        let second = QdrantVectorStore::new_local().unwrap();
        let collection = test_collection();

        let (a, b) = tokio::join!(
            first.ensure_collection(&collection, 4),
            second.ensure_collection(&collection, 4)
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(a || b);
        assert!(!(a && b));

        let _ = first.delete_collection(&collection).await;
    }

    #[tokio::test]
    #[ignore] // Requires running Qdrant instance
    async fn test_delete_forgets_known_collection() {
        let store = QdrantVectorStore::new_local().unwrap();
        let collection = test_collection();
        let query = EmbeddingVector::new(vec![1.0; 4]).unwrap();

        assert!(store.ensure_collection(&collection, 4).await.unwrap());
        assert!(store.delete_collection(&collection).await.unwrap());

        // Deleted collections read as empty and can be created again
        assert!(store
            .search(&collection, &query, 3, &MetadataFilter::new())
            .await
            .unwrap()
            .is_empty());
        assert!(store.ensure_collection(&collection, 4).await.unwrap());

        let _ = store.delete_collection(&collection).await;
    }

    #[tokio::test]
    #[ignore] // Requires running Qdrant instance
    async fn test_missing_collection_is_empty() {
        let store = QdrantVectorStore::new_local().unwrap();
        let collection = test_collection();
        let query = EmbeddingVector::new(vec![1.0; 4]).unwrap();

        assert!(store
            .search(&collection, &query, 3, &MetadataFilter::new())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            store.count(&collection, &MetadataFilter::new()).await.unwrap(),
            0
        );
    }
}
