/// Embedding providers: text in, fixed-dimension vectors out
mod fastembed_service;
mod gigachat_embeddings;
mod hashing_embedder;

pub use fastembed_service::FastEmbedService;
pub use gigachat_embeddings::{GigaChatEmbeddings, GIGACHAT_EMBEDDING_DIMENSIONS};
pub use hashing_embedder::HashingEmbedder;

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::domain::base::{ConfigurationError, DomainError};
use crate::domain::value_objects::EmbeddingVector;
use crate::infrastructure::config::Settings;
use crate::infrastructure::gigachat::{GigaChatClient, GigaChatError};

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embedding service request failed: {0}")]
    Remote(#[from] GigaChatError),

    #[error("Embedding model error: {0:#}")]
    Model(#[source] anyhow::Error),

    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("Expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Invalid embedding: {0}")]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Converts batches of text into vectors.
///
/// One vector per input, in input order, all of `dimension_count()` length.
/// Calls are independent and never retried internally.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Registry key of this provider
    fn name(&self) -> &'static str;

    fn dimension_count(&self) -> usize;

    async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<EmbeddingVector>>;

    async fn embed_query(&self, text: &str) -> EmbeddingResult<EmbeddingVector> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::CountMismatch {
                expected: 1,
                actual: 0,
            })
    }
}

/// Registry of embedding backends, selected by configuration key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProviderKind {
    GigaChat,
    FastEmbed,
    Hashing,
}

impl EmbeddingProviderKind {
    pub const ALL: [EmbeddingProviderKind; 3] = [
        EmbeddingProviderKind::GigaChat,
        EmbeddingProviderKind::FastEmbed,
        EmbeddingProviderKind::Hashing,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            EmbeddingProviderKind::GigaChat => "gigachat",
            EmbeddingProviderKind::FastEmbed => "fastembed",
            EmbeddingProviderKind::Hashing => "hashing",
        }
    }

    /// Construct the provider. GigaChat reuses `client` when one is given.
    pub async fn build(
        &self,
        settings: &Settings,
        client: Option<Arc<GigaChatClient>>,
    ) -> EmbeddingResult<Arc<dyn EmbeddingProvider>> {
        info!("Creating embedding provider: {}", self);

        let provider: Arc<dyn EmbeddingProvider> = match self {
            EmbeddingProviderKind::GigaChat => {
                let client = match client {
                    Some(client) => client,
                    None => Arc::new(GigaChatClient::new(settings.gigachat.clone())?),
                };
                Arc::new(GigaChatEmbeddings::new(client))
            }
            EmbeddingProviderKind::FastEmbed => Arc::new(
                FastEmbedService::new(settings.fastembed_model)
                    .await
                    .map_err(EmbeddingError::Model)?,
            ),
            EmbeddingProviderKind::Hashing => {
                Arc::new(HashingEmbedder::new(settings.hashing_dimensions)?)
            }
        };

        Ok(provider)
    }
}

impl FromStr for EmbeddingProviderKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.key() == key)
            .ok_or_else(|| ConfigurationError::UnknownEmbeddingProvider(s.to_string()))
    }
}

impl fmt::Display for EmbeddingProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
