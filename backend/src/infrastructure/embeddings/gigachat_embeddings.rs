/// GigaChat embeddings endpoint
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
use crate::domain::value_objects::EmbeddingVector;
use crate::infrastructure::gigachat::GigaChatClient;

/// Vector size of the `Embeddings` model
pub const GIGACHAT_EMBEDDING_DIMENSIONS: usize = 1024;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Remote embeddings through the GigaChat API, one round trip per batch
pub struct GigaChatEmbeddings {
    client: Arc<GigaChatClient>,
    dimension_count: usize,
}

impl GigaChatEmbeddings {
    pub fn new(client: Arc<GigaChatClient>) -> Self {
        Self::with_dimensions(client, GIGACHAT_EMBEDDING_DIMENSIONS)
    }

    pub fn with_dimensions(client: Arc<GigaChatClient>, dimension_count: usize) -> Self {
        GigaChatEmbeddings {
            client,
            dimension_count,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for GigaChatEmbeddings {
    fn name(&self) -> &'static str {
        "gigachat"
    }

    fn dimension_count(&self) -> usize {
        self.dimension_count
    }

    async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Requesting GigaChat embeddings for {} texts", texts.len());

        let request = EmbeddingRequest {
            model: &self.client.config().embedding_model,
            input: texts,
        };
        let mut response: EmbeddingResponse = self.client.post_json("embeddings", &request).await?;

        if response.data.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: response.data.len(),
            });
        }

        // The API reports each vector's input position; restore input order
        response.data.sort_by_key(|d| d.index);

        response
            .data
            .into_iter()
            .enumerate()
            .map(|(position, data)| {
                if data.index != position {
                    return Err(EmbeddingError::InvalidResponse(format!(
                        "missing embedding for input {}",
                        position
                    )));
                }
                if data.embedding.len() != self.dimension_count {
                    return Err(EmbeddingError::InvalidResponse(format!(
                        "expected {} dimensions, got {}",
                        self.dimension_count,
                        data.embedding.len()
                    )));
                }
                Ok(EmbeddingVector::new(data.embedding)?)
            })
            .collect()
    }
}
