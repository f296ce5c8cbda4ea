/// GigaChat API access shared by the embedding provider and answer generator
mod client;

pub use client::{GigaChatClient, GigaChatConfig, GigaChatError, GigaChatResult};
