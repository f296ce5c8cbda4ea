/// Vector store backends
mod in_memory_store;
mod qdrant_store;

pub use in_memory_store::InMemoryVectorStore;
pub use qdrant_store::QdrantVectorStore;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::application::repositories::{VectorStoreBackend, VectorStoreError, VectorStoreResult};
use crate::domain::base::ConfigurationError;
use crate::infrastructure::config::Settings;

/// Which backend to store vectors in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorStoreKind {
    Qdrant,
    Memory,
}

impl VectorStoreKind {
    pub fn key(&self) -> &'static str {
        match self {
            VectorStoreKind::Qdrant => "qdrant",
            VectorStoreKind::Memory => "memory",
        }
    }

    pub fn build(&self, settings: &Settings) -> VectorStoreResult<Arc<dyn VectorStoreBackend>> {
        info!("Creating vector store backend: {}", self);

        let backend: Arc<dyn VectorStoreBackend> = match self {
            VectorStoreKind::Qdrant => Arc::new(
                QdrantVectorStore::new(&settings.qdrant_url).map_err(VectorStoreError::Backend)?,
            ),
            VectorStoreKind::Memory => Arc::new(InMemoryVectorStore::new()),
        };
        Ok(backend)
    }
}

impl FromStr for VectorStoreKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "qdrant" => Ok(VectorStoreKind::Qdrant),
            "memory" | "in-memory" => Ok(VectorStoreKind::Memory),
            _ => Err(ConfigurationError::UnknownVectorStore(s.to_string())),
        }
    }
}

impl fmt::Display for VectorStoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
