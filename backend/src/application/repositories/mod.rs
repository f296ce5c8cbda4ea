pub mod vector_store;

pub use vector_store::{VectorStoreBackend, VectorStoreError, VectorStoreResult};
