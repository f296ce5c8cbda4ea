pub mod config;
pub mod embeddings;
pub mod file_system;
pub mod gigachat;
pub mod llm;
pub mod text;
pub mod vector_store;
