/// FastEmbed provider for local embedding generation
use anyhow::{Context, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel as FastEmbedModel, InitOptions, TextEmbedding};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
use crate::domain::value_objects::{EmbeddingModel, EmbeddingVector};

/// Embeds text with a local ONNX model; the model is downloaded on first use
pub struct FastEmbedService {
    model: Arc<Mutex<TextEmbedding>>,
    model_type: EmbeddingModel,
}

impl FastEmbedService {
    /// Create a new FastEmbed service with the specified model
    pub async fn new(model_type: EmbeddingModel) -> Result<Self> {
        info!("Initializing FastEmbed service with model: {}", model_type);

        let fastembed_model = match model_type {
            EmbeddingModel::AllMiniLML6V2 => FastEmbedModel::AllMiniLML6V2,
        };

        let model = TextEmbedding::try_new(
            InitOptions::new(fastembed_model).with_show_download_progress(true),
        )
        .context("Failed to initialize FastEmbed model")?;

        info!("FastEmbed model initialized successfully");

        Ok(FastEmbedService {
            model: Arc::new(Mutex::new(model)),
            model_type,
        })
    }

    pub fn model_type(&self) -> EmbeddingModel {
        self.model_type
    }

    async fn embed_batch(&self, texts: Vec<&str>) -> Result<Vec<Vec<f32>>> {
        let mut model = self.model.lock().await;
        model
            .embed(texts, None)
            .context("Failed to generate batch embeddings")
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedService {
    fn name(&self) -> &'static str {
        "fastembed"
    }

    fn dimension_count(&self) -> usize {
        self.model_type.dimension_count()
    }

    async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<EmbeddingVector>> {
        debug!("Generating embeddings for batch of {} texts", texts.len());

        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let raw = self
            .embed_batch(texts.iter().map(String::as_str).collect())
            .await
            .map_err(EmbeddingError::Model)?;

        if raw.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: raw.len(),
            });
        }

        let embeddings = raw
            .into_iter()
            .map(EmbeddingVector::new)
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Generated {} embeddings successfully", embeddings.len());
        Ok(embeddings)
    }
}
