/// Answer generation from a question and retrieved context
mod gigachat_chat;

pub use gigachat_chat::{GigaChatAnswerGenerator, SYSTEM_PROMPT};

use async_trait::async_trait;
use thiserror::Error;

use crate::infrastructure::gigachat::GigaChatError;

#[derive(Error, Debug)]
pub enum AnswerGenerationError {
    #[error("Chat completion failed: {0}")]
    Remote(#[from] GigaChatError),

    #[error("Chat completion returned no answer")]
    EmptyResponse,

    #[error("Answer generator failed: {0}")]
    Other(String),
}

pub type AnswerGenerationResult<T> = Result<T, AnswerGenerationError>;

/// Turns a question plus ranked context passages into an answer
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, query: &str, context: &[String]) -> AnswerGenerationResult<String>;
}
