/// Value objects for the domain layer
use super::base::{ConfigurationError, ConfigurationResult, DomainError, DomainResult, ValueObject};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Validated chunking configuration: `0 <= chunk_overlap < chunk_size`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ChunkingParams {
    /// Signed inputs so that negative overlaps coming from configuration are
    /// rejected here instead of wrapping around.
    pub fn new(chunk_size: i64, chunk_overlap: i64) -> ConfigurationResult<Self> {
        if chunk_size <= 0 {
            return Err(ConfigurationError::InvalidChunkParams(format!(
                "chunk size must be positive, got {}",
                chunk_size
            )));
        }
        if chunk_overlap < 0 {
            return Err(ConfigurationError::InvalidChunkParams(format!(
                "chunk overlap cannot be negative, got {}",
                chunk_overlap
            )));
        }
        if chunk_overlap >= chunk_size {
            return Err(ConfigurationError::InvalidChunkParams(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(ChunkingParams {
            chunk_size: chunk_size as usize,
            chunk_overlap: chunk_overlap as usize,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Default for ChunkingParams {
    fn default() -> Self {
        ChunkingParams {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ValueObject for ChunkingParams {}

/// Name of a vector store collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionName(String);

impl CollectionName {
    pub fn new(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::InvalidValue(
                "Collection name cannot be empty".to_string(),
            ));
        }
        if name.contains('/') || name.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidValue(format!(
                "Collection name cannot contain '/' or whitespace: {}",
                name
            )));
        }
        Ok(CollectionName(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CollectionName {
    fn default() -> Self {
        CollectionName("history_documents".to_string())
    }
}

impl ValueObject for CollectionName {}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a stored vector record, unique within its collection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::InvalidValue("RecordId cannot be empty".to_string()));
        }
        Ok(RecordId(id))
    }

    /// Fresh random identifier. Never derived from content, so re-ingesting
    /// the same document yields new records.
    pub fn generate() -> Self {
        RecordId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for RecordId {}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Local embedding models available through fastembed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingModel {
    #[default]
    AllMiniLML6V2,
}

impl EmbeddingModel {
    pub fn dimension_count(&self) -> usize {
        match self {
            EmbeddingModel::AllMiniLML6V2 => 384,
        }
    }
}

impl ValueObject for EmbeddingModel {}

impl fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingModel::AllMiniLML6V2 => write!(f, "all-MiniLM-L6-v2"),
        }
    }
}

/// A fixed-length embedding vector
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector {
    dimensions: Vec<f32>,
}

impl EmbeddingVector {
    pub fn new(dimensions: Vec<f32>) -> DomainResult<Self> {
        if dimensions.is_empty() {
            return Err(DomainError::InvalidValue(
                "Embedding vector cannot be empty".to_string(),
            ));
        }
        if dimensions.iter().any(|d| !d.is_finite()) {
            return Err(DomainError::InvalidValue(
                "Embedding vector contains non-finite values".to_string(),
            ));
        }
        Ok(EmbeddingVector { dimensions })
    }

    pub fn dimensions(&self) -> &[f32] {
        &self.dimensions
    }

    pub fn dimension_count(&self) -> usize {
        self.dimensions.len()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.dimensions
    }

    /// Cosine similarity in `[-1, 1]`; zero vectors have similarity 0
    pub fn cosine_similarity(&self, other: &EmbeddingVector) -> DomainResult<f32> {
        if self.dimension_count() != other.dimension_count() {
            return Err(DomainError::DimensionMismatch {
                expected: self.dimension_count(),
                actual: other.dimension_count(),
            });
        }

        let dot: f32 = self
            .dimensions
            .iter()
            .zip(other.dimensions.iter())
            .map(|(a, b)| a * b)
            .sum();
        let norm_a = self.norm();
        let norm_b = other.norm();

        if norm_a == 0.0 || norm_b == 0.0 {
            return Ok(0.0);
        }

        Ok(dot / (norm_a * norm_b))
    }

    /// Cosine distance (`1 - similarity`), smaller is closer
    pub fn cosine_distance(&self, other: &EmbeddingVector) -> DomainResult<f32> {
        Ok(1.0 - self.cosine_similarity(other)?)
    }

    fn norm(&self) -> f32 {
        self.dimensions.iter().map(|d| d * d).sum::<f32>().sqrt()
    }
}

impl ValueObject for EmbeddingVector {}

/// A flat scalar metadata value. Stores only index and filter on these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Integer(i64),
    Text(String),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            MetadataValue::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(i) => Some(*i),
            MetadataValue::Text(_) => None,
        }
    }
}

impl ValueObject for MetadataValue {}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        MetadataValue::Integer(value as i64)
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Integer(i) => write!(f, "{}", i),
            MetadataValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Conjunction of metadata equality conditions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetadataFilter {
    conditions: Vec<(String, MetadataValue)>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key == value`
    pub fn field_eq(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.conditions.push((key.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, MetadataValue)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// An empty filter matches everything
    pub fn matches(&self, fields: &BTreeMap<String, MetadataValue>) -> bool {
        self.conditions
            .iter()
            .all(|(key, value)| fields.get(key) == Some(value))
    }
}

impl ValueObject for MetadataFilter {}

/// Tracks the progress of an ingestion batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestProgress {
    files_processed: usize,
    total_files: usize,
    current_file: Option<PathBuf>,
}

impl IngestProgress {
    pub fn new(total_files: usize) -> Self {
        IngestProgress {
            files_processed: 0,
            total_files,
            current_file: None,
        }
    }

    pub fn increment(&mut self) {
        self.files_processed += 1;
    }

    pub fn set_current_file(&mut self, file: Option<PathBuf>) {
        self.current_file = file;
    }

    pub fn files_processed(&self) -> usize {
        self.files_processed
    }

    pub fn total_files(&self) -> usize {
        self.total_files
    }

    pub fn current_file(&self) -> Option<&PathBuf> {
        self.current_file.as_ref()
    }

    pub fn percentage(&self) -> f64 {
        if self.total_files == 0 {
            return 100.0;
        }
        (self.files_processed as f64 / self.total_files as f64) * 100.0
    }
}

impl ValueObject for IngestProgress {}
