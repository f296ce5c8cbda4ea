/// Base abstractions for the domain layer
use std::fmt::Debug;
use thiserror::Error;

/// Trait for value objects - immutable objects defined by their attributes
/// Value objects are equal if all their attributes are equal
pub trait ValueObject: Clone + PartialEq + Debug {}

/// Trait for entities - objects with identity
/// Entities are equal if their IDs are equal, regardless of other attributes
pub trait Entity: Debug {
    type Id: ValueObject;

    fn id(&self) -> &Self::Id;
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid value provided
    InvalidValue(String),
    /// Two values that must agree in size do not
    DimensionMismatch { expected: usize, actual: usize },
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainError::InvalidValue(msg) => write!(f, "Invalid value: {}", msg),
            DomainError::DimensionMismatch { expected, actual } => write!(
                f,
                "Dimension mismatch: expected {}, got {}",
                expected, actual
            ),
        }
    }
}

impl std::error::Error for DomainError {}

/// Fatal misconfiguration detected while building a component.
///
/// Raised before any I/O happens; callers are expected to abort start-up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Invalid chunk parameters: {0}")]
    InvalidChunkParams(String),

    #[error("Unknown embedding service: {0}")]
    UnknownEmbeddingProvider(String),

    #[error("Unknown vector store backend: {0}")]
    UnknownVectorStore(String),

    #[error("Missing setting: {0}")]
    MissingSetting(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidSetting { key: String, value: String },
}

pub type ConfigurationResult<T> = Result<T, ConfigurationError>;
