/// Deterministic bag-of-words embeddings via feature hashing
use async_trait::async_trait;

use super::{EmbeddingProvider, EmbeddingResult};
use crate::domain::base::ConfigurationError;
use crate::domain::value_objects::EmbeddingVector;

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// Offline provider: each lower-cased word increments one hashed bucket and
/// the result is L2-normalised. Texts sharing words end up close under
/// cosine distance. No network, no model files.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension_count: usize,
}

impl HashingEmbedder {
    pub fn new(dimension_count: usize) -> Result<Self, ConfigurationError> {
        if dimension_count == 0 {
            return Err(ConfigurationError::InvalidSetting {
                key: "HASHING_DIMENSIONS".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(HashingEmbedder { dimension_count })
    }

    fn bucket(&self, token: &str) -> usize {
        let hash = token.bytes().fold(FNV_OFFSET, |hash, byte| {
            (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
        });
        (hash % self.dimension_count as u64) as usize
    }

    fn embed_text(&self, text: &str) -> EmbeddingResult<EmbeddingVector> {
        let mut dimensions = vec![0.0_f32; self.dimension_count];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            dimensions[self.bucket(&token.to_lowercase())] += 1.0;
        }

        let norm = dimensions.iter().map(|d| d * d).sum::<f32>().sqrt();
        if norm > 0.0 {
            dimensions.iter_mut().for_each(|d| *d /= norm);
        }

        Ok(EmbeddingVector::new(dimensions)?)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn name(&self) -> &'static str {
        "hashing"
    }

    fn dimension_count(&self) -> usize {
        self.dimension_count
    }

    async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<EmbeddingVector>> {
        texts.iter().map(|text| self.embed_text(text)).collect()
    }
}
