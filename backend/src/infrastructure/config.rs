/// Process configuration loaded from environment variables
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::domain::base::{ConfigurationError, ConfigurationResult};
use crate::domain::value_objects::{ChunkingParams, CollectionName, EmbeddingModel};
use crate::infrastructure::embeddings::EmbeddingProviderKind;
use crate::infrastructure::gigachat::GigaChatConfig;
use crate::infrastructure::vector_store::VectorStoreKind;

/// Everything the pipeline needs to build its components.
///
/// Loaded once by the binary and passed by reference; nothing reads the
/// environment after start-up.
#[derive(Debug, Clone)]
pub struct Settings {
    pub chunking: ChunkingParams,
    pub collection_name: CollectionName,
    pub embedding_provider: EmbeddingProviderKind,
    pub vector_store: VectorStoreKind,
    pub qdrant_url: String,
    pub gigachat: GigaChatConfig,
    pub fastembed_model: EmbeddingModel,
    pub hashing_dimensions: usize,
    pub embedding_batch_size: usize,
    pub retrieval_k: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            chunking: ChunkingParams::default(),
            collection_name: CollectionName::default(),
            embedding_provider: EmbeddingProviderKind::GigaChat,
            vector_store: VectorStoreKind::Qdrant,
            qdrant_url: "http://localhost:6334".to_string(),
            gigachat: GigaChatConfig::default(),
            fastembed_model: EmbeddingModel::default(),
            hashing_dimensions: 512,
            embedding_batch_size: 32,
            retrieval_k: 5,
        }
    }
}

impl Settings {
    /// Load from the process environment, reading `.env` first if present
    pub fn from_env() -> ConfigurationResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> ConfigurationResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let chunk_size = parse_or(&get, "CHUNK_SIZE", defaults.chunking.chunk_size() as i64)?;
        let chunk_overlap =
            parse_or(&get, "CHUNK_OVERLAP", defaults.chunking.chunk_overlap() as i64)?;
        let chunking = ChunkingParams::new(chunk_size, chunk_overlap)?;

        let collection_name = match get("COLLECTION_NAME") {
            Some(name) => CollectionName::new(name.trim()).map_err(|_| {
                ConfigurationError::InvalidSetting {
                    key: "COLLECTION_NAME".to_string(),
                    value: name.clone(),
                }
            })?,
            None => defaults.collection_name,
        };

        let embedding_provider = match get("EMBEDDING_SERVICE") {
            Some(key) => key.parse()?,
            None => defaults.embedding_provider,
        };
        let vector_store = match get("VECTOR_STORE") {
            Some(key) => key.parse()?,
            None => defaults.vector_store,
        };

        let gigachat_defaults = defaults.gigachat;
        let timeout_secs = parse_or(
            &get,
            "HTTP_TIMEOUT_SECS",
            gigachat_defaults.timeout.as_secs(),
        )?;
        let gigachat = GigaChatConfig {
            credentials: get("GIGACHAT_API_KEY").unwrap_or_default(),
            scope: get("GIGACHAT_SCOPE").unwrap_or(gigachat_defaults.scope),
            auth_url: get("GIGACHAT_AUTH_URL").unwrap_or(gigachat_defaults.auth_url),
            base_url: get("GIGACHAT_BASE_URL").unwrap_or(gigachat_defaults.base_url),
            chat_model: get("LLM_GIGACHAT_MODEL").unwrap_or(gigachat_defaults.chat_model),
            embedding_model: get("GIGACHAT_EMBEDDING_MODEL")
                .unwrap_or(gigachat_defaults.embedding_model),
            verify_ssl: parse_bool_or(&get, "GIGACHAT_VERIFY_SSL", gigachat_defaults.verify_ssl)?,
            timeout: Duration::from_secs(timeout_secs),
        };

        let hashing_dimensions =
            parse_positive_or(&get, "HASHING_DIMENSIONS", defaults.hashing_dimensions)?;
        let embedding_batch_size =
            parse_positive_or(&get, "EMBEDDING_BATCH_SIZE", defaults.embedding_batch_size)?;
        let retrieval_k = parse_positive_or(&get, "RETRIEVAL_K", defaults.retrieval_k)?;

        Ok(Settings {
            chunking,
            collection_name,
            embedding_provider,
            vector_store,
            qdrant_url: get("QDRANT_URL").unwrap_or(defaults.qdrant_url),
            gigachat,
            fastembed_model: defaults.fastembed_model,
            hashing_dimensions,
            embedding_batch_size,
            retrieval_k,
        })
    }
}

fn parse_or<G, T>(get: &G, key: &str, default: T) -> ConfigurationResult<T>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigurationError::InvalidSetting {
                key: key.to_string(),
                value: raw,
            }),
        None => Ok(default),
    }
}

fn parse_positive_or<G>(get: &G, key: &str, default: usize) -> ConfigurationResult<usize>
where
    G: Fn(&str) -> Option<String>,
{
    let value = parse_or(get, key, default)?;
    if value == 0 {
        return Err(ConfigurationError::InvalidSetting {
            key: key.to_string(),
            value: "0".to_string(),
        });
    }
    Ok(value)
}

fn parse_bool_or<G>(get: &G, key: &str, default: bool) -> ConfigurationResult<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigurationError::InvalidSetting {
                key: key.to_string(),
                value: raw,
            }),
        },
        None => Ok(default),
    }
}
