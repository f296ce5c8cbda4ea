/// Domain entities: chunks, their metadata, and stored vector records
use super::base::{Entity, ValueObject};
use super::value_objects::{EmbeddingVector, MetadataValue, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A contiguous substring of a cleaned source document.
///
/// `start` and `end` are character offsets into the cleaned text, so the
/// overlap with the next chunk is `end - next.start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    index: usize,
    text: String,
    start: usize,
    end: usize,
}

impl Chunk {
    pub fn new(index: usize, text: impl Into<String>, start: usize, end: usize) -> Self {
        Chunk {
            index,
            text: text.into(),
            start,
            end,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// Length in characters, not bytes
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

impl ValueObject for Chunk {}

/// Provenance and position of a chunk.
///
/// Created once per chunk and never mutated afterwards. Every field is a flat
/// scalar because vector stores only index key/value pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source identifier as passed to the processor (file path or URL)
    pub path: String,
    /// Citation URL; equals `path` unless a manifest supplied one
    pub source: String,
    pub topic: String,
    pub filename: String,
    pub chunk_id: usize,
    pub chunk_total: usize,
    pub chunk_text_length: usize,
    /// Length of the whole cleaned document
    pub document_length: usize,
    pub ingested_at: String,
}

impl ChunkMetadata {
    pub const PATH: &'static str = "path";
    pub const SOURCE: &'static str = "source";
    pub const TOPIC: &'static str = "topic";
    pub const FILENAME: &'static str = "filename";
    pub const CHUNK_ID: &'static str = "chunk_id";
    pub const CHUNK_TOTAL: &'static str = "chunk_total";
    pub const CHUNK_TEXT_LENGTH: &'static str = "chunk_text_length";
    pub const DOCUMENT_LENGTH: &'static str = "document_length";
    pub const INGESTED_AT: &'static str = "ingested_at";

    /// Metadata for a single hand-written record, mostly useful for loading
    /// ad-hoc texts that do not come from a document.
    pub fn for_text(source: impl Into<String>, topic: impl Into<String>, text: &str) -> Self {
        let source = source.into();
        let length = text.chars().count();
        ChunkMetadata {
            path: source.clone(),
            source,
            topic: topic.into(),
            filename: String::new(),
            chunk_id: 0,
            chunk_total: 1,
            chunk_text_length: length,
            document_length: length,
            ingested_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Flatten into the key/value form stored alongside vectors
    pub fn to_fields(&self) -> BTreeMap<String, MetadataValue> {
        let mut fields = BTreeMap::new();
        fields.insert(Self::PATH.to_string(), self.path.clone().into());
        fields.insert(Self::SOURCE.to_string(), self.source.clone().into());
        fields.insert(Self::TOPIC.to_string(), self.topic.clone().into());
        fields.insert(Self::FILENAME.to_string(), self.filename.clone().into());
        fields.insert(Self::CHUNK_ID.to_string(), self.chunk_id.into());
        fields.insert(Self::CHUNK_TOTAL.to_string(), self.chunk_total.into());
        fields.insert(
            Self::CHUNK_TEXT_LENGTH.to_string(),
            self.chunk_text_length.into(),
        );
        fields.insert(
            Self::DOCUMENT_LENGTH.to_string(),
            self.document_length.into(),
        );
        fields.insert(Self::INGESTED_AT.to_string(), self.ingested_at.clone().into());
        fields
    }

    /// Rebuild from stored fields. Missing fields fall back to defaults so
    /// records written by older ingestions stay readable.
    pub fn from_fields(fields: &BTreeMap<String, MetadataValue>) -> Self {
        let text = |key: &str| {
            fields
                .get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_default()
        };
        let number = |key: &str| {
            fields
                .get(key)
                .and_then(|v| v.as_integer())
                .map(|i| i.max(0) as usize)
                .unwrap_or_default()
        };

        ChunkMetadata {
            path: text(Self::PATH),
            source: text(Self::SOURCE),
            topic: text(Self::TOPIC),
            filename: text(Self::FILENAME),
            chunk_id: number(Self::CHUNK_ID),
            chunk_total: number(Self::CHUNK_TOTAL),
            chunk_text_length: number(Self::CHUNK_TEXT_LENGTH),
            document_length: number(Self::DOCUMENT_LENGTH),
            ingested_at: text(Self::INGESTED_AT),
        }
    }
}

impl ValueObject for ChunkMetadata {}

/// The unit of storage in a vector store collection
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    id: RecordId,
    text: String,
    embedding: EmbeddingVector,
    metadata: ChunkMetadata,
}

impl VectorRecord {
    pub fn new(
        id: RecordId,
        text: impl Into<String>,
        embedding: EmbeddingVector,
        metadata: ChunkMetadata,
    ) -> Self {
        VectorRecord {
            id,
            text: text.into(),
            embedding,
            metadata,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn embedding(&self) -> &EmbeddingVector {
        &self.embedding
    }

    pub fn metadata(&self) -> &ChunkMetadata {
        &self.metadata
    }
}

impl Entity for VectorRecord {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> ChunkMetadata {
        ChunkMetadata {
            path: "docs/cleaned_varyag_1.txt".to_string(),
            source: "https://example.org/varyag".to_string(),
            topic: "varyag".to_string(),
            filename: "varyag_1".to_string(),
            chunk_id: 2,
            chunk_total: 5,
            chunk_text_length: 120,
            document_length: 480,
            ingested_at: "2024-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_chunk_offsets() {
        let chunk = Chunk::new(0, "Крейсер", 10, 17);
        assert_eq!(chunk.char_len(), 7);
        assert_eq!(chunk.text().chars().count(), chunk.char_len());
    }

    #[test]
    fn test_metadata_fields_round_trip() {
        let metadata = sample_metadata();
        let fields = metadata.to_fields();

        assert_eq!(fields.len(), 9);
        assert_eq!(fields["topic"], MetadataValue::from("varyag"));
        assert_eq!(fields["chunk_id"], MetadataValue::Integer(2));
        assert_eq!(ChunkMetadata::from_fields(&fields), metadata);
    }

    #[test]
    fn test_metadata_from_partial_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("topic".to_string(), MetadataValue::from("topic1"));

        let metadata = ChunkMetadata::from_fields(&fields);
        assert_eq!(metadata.topic, "topic1");
        assert_eq!(metadata.path, "");
        assert_eq!(metadata.chunk_total, 0);
    }

    #[test]
    fn test_metadata_for_text() {
        let metadata = ChunkMetadata::for_text("transcript", "russo_japanese_war", "Текст 1");
        assert_eq!(metadata.path, "transcript");
        assert_eq!(metadata.source, "transcript");
        assert_eq!(metadata.chunk_text_length, 7);
        assert_eq!(metadata.chunk_total, 1);
    }

    #[test]
    fn test_vector_record_identity() {
        let id = RecordId::new("doc_0").unwrap();
        let record = VectorRecord::new(
            id.clone(),
            "text",
            EmbeddingVector::new(vec![1.0]).unwrap(),
            sample_metadata(),
        );
        assert_eq!(record.id(), &id);
        assert_eq!(record.text(), "text");
    }
}
