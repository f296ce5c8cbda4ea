use std::collections::BTreeMap;

use crate::domain::entities::ChunkMetadata;
use crate::domain::value_objects::{EmbeddingVector, RecordId};

/// What to search with
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    /// Raw text, embedded by the store's own provider
    Text(String),
    /// A vector computed by the caller, used as-is
    Vector(EmbeddingVector),
}

impl From<&str> for QueryInput {
    fn from(text: &str) -> Self {
        QueryInput::Text(text.to_string())
    }
}

impl From<String> for QueryInput {
    fn from(text: String) -> Self {
        QueryInput::Text(text)
    }
}

impl From<EmbeddingVector> for QueryInput {
    fn from(vector: EmbeddingVector) -> Self {
        QueryInput::Vector(vector)
    }
}

/// One nearest-neighbour hit
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub id: RecordId,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine distance to the query, smaller is closer
    pub distance: f32,
}

/// A stored record without its vector
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: RecordId,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Raw facts a backend reports about a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    pub points_count: usize,
    pub dimension_count: usize,
}

/// Collection statistics as reported to users
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionStats {
    pub name: String,
    pub count: usize,
    pub metadata: BTreeMap<String, String>,
}
