/// Retrieval-augmented answering: nearest chunks in, generated answer out
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::application::dto::{QueryInput, QueryMatch};
use crate::application::repositories::VectorStoreError;
use crate::application::services::DocumentStore;
use crate::domain::value_objects::{CollectionName, MetadataFilter};
use crate::infrastructure::embeddings::EmbeddingProvider;
use crate::infrastructure::llm::{AnswerGenerationError, AnswerGenerator};

pub const DEFAULT_RETRIEVAL_K: usize = 5;

/// Reply sent to the user when no answer could be produced
pub const FALLBACK_ANSWER: &str =
    "Извините, не удалось получить ответ на ваш вопрос. Попробуйте повторить запрос позже.";

/// Lifecycle of a single question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Retrieving,
    Generating,
    Done,
    Failed,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestState::Idle => "idle",
            RequestState::Retrieving => "retrieving",
            RequestState::Generating => "generating",
            RequestState::Done => "done",
            RequestState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Retrieval failed: {0}")]
    Retrieval(#[source] VectorStoreError),

    #[error("Answer generation failed: {0}")]
    Generation(#[source] AnswerGenerationError),
}

impl RagError {
    /// The state the request was in when it failed
    pub fn failed_in(&self) -> RequestState {
        match self {
            RagError::Retrieval(_) => RequestState::Retrieving,
            RagError::Generation(_) => RequestState::Generating,
        }
    }
}

pub type RagResult<T> = Result<T, RagError>;

struct RequestTracker {
    state: RequestState,
}

impl RequestTracker {
    fn new() -> Self {
        RequestTracker {
            state: RequestState::Idle,
        }
    }

    fn advance(&mut self, next: RequestState) {
        debug!("Request state: {} -> {}", self.state, next);
        self.state = next;
    }
}

/// Answers questions from a collection of stored chunks
pub struct RagService {
    store: Arc<DocumentStore>,
    generator: Arc<dyn AnswerGenerator>,
    query_embedder: Option<Arc<dyn EmbeddingProvider>>,
    default_k: usize,
}

impl RagService {
    pub fn new(store: Arc<DocumentStore>, generator: Arc<dyn AnswerGenerator>) -> Self {
        RagService {
            store,
            generator,
            query_embedder: None,
            default_k: DEFAULT_RETRIEVAL_K,
        }
    }

    /// Embed questions with `embedder` and search by vector, instead of
    /// letting the store embed the raw text
    pub fn with_query_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.query_embedder = Some(embedder);
        self
    }

    pub fn with_default_k(mut self, k: usize) -> Self {
        self.default_k = k;
        self
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// Up to `k` stored chunks nearest to `query`, closest first
    pub async fn retrieve(
        &self,
        query: &str,
        collection: &CollectionName,
        k: usize,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        let input = match &self.query_embedder {
            Some(embedder) => QueryInput::Vector(embedder.embed_query(query).await?),
            None => QueryInput::Text(query.to_string()),
        };
        self.store
            .query(collection, input, k, &MetadataFilter::new())
            .await
    }

    /// Retrieve context for `query` and pass it, in rank order, to the answer
    /// generator. The generator's output is returned unmodified.
    pub async fn generate_answer(
        &self,
        query: &str,
        collection: &CollectionName,
        k: Option<usize>,
    ) -> RagResult<String> {
        let k = k.unwrap_or(self.default_k);
        let mut tracker = RequestTracker::new();

        tracker.advance(RequestState::Retrieving);
        let matches = match self.retrieve(query, collection, k).await {
            Ok(matches) => matches,
            Err(e) => {
                tracker.advance(RequestState::Failed);
                return Err(RagError::Retrieval(e));
            }
        };
        info!(
            "Retrieved {} passages from '{}' for query: {}",
            matches.len(),
            collection,
            query
        );

        let context: Vec<String> = matches.into_iter().map(|m| m.text).collect();

        tracker.advance(RequestState::Generating);
        let answer = match self.generator.generate(query, &context).await {
            Ok(answer) => answer,
            Err(e) => {
                tracker.advance(RequestState::Failed);
                return Err(RagError::Generation(e));
            }
        };

        tracker.advance(RequestState::Done);
        Ok(answer)
    }

    /// Like `generate_answer` with the default `k`, but never fails: errors
    /// are logged and replaced by a fixed apology.
    pub async fn answer_or_fallback(&self, query: &str, collection: &CollectionName) -> String {
        match self.generate_answer(query, collection, None).await {
            Ok(answer) => answer,
            Err(e) => {
                error!("Failed to answer while {}: {}", e.failed_in(), e);
                FALLBACK_ANSWER.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ChunkMetadata;
    use crate::infrastructure::embeddings::HashingEmbedder;
    use crate::infrastructure::llm::AnswerGenerationResult;
    use crate::infrastructure::vector_store::InMemoryVectorStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Records what it was asked and echoes the context back
    struct EchoGenerator {
        calls: Mutex<Vec<(String, Vec<String>)>>,
        fail: bool,
    }

    impl EchoGenerator {
        fn new(fail: bool) -> Self {
            EchoGenerator {
                calls: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl AnswerGenerator for EchoGenerator {
        async fn generate(&self, query: &str, context: &[String]) -> AnswerGenerationResult<String> {
            self.calls.lock().push((query.to_string(), context.to_vec()));
            if self.fail {
                return Err(AnswerGenerationError::EmptyResponse);
            }
            Ok(context.join(" | "))
        }
    }

    fn collection() -> CollectionName {
        CollectionName::new("rag_test").unwrap()
    }

    async fn seeded_store() -> Arc<DocumentStore> {
        let store = DocumentStore::new(
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(HashingEmbedder::new(256).unwrap()),
        );
        let texts = vec![
            "Цусимское сражение произошло в 1905 году.".to_string(),
            "Оборона Порт-Артура длилась почти год.".to_string(),
            "Портсмутский мир подписан в августе.".to_string(),
        ];
        let metadatas = texts
            .iter()
            .map(|t| ChunkMetadata::for_text("war.txt", "war", t))
            .collect();
        store.add_documents(&collection(), texts, metadatas).await.unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_generate_answer_passes_ranked_context() {
        let generator = Arc::new(EchoGenerator::new(false));
        let rag = RagService::new(seeded_store().await, generator.clone());

        let answer = rag
            .generate_answer("Когда произошло Цусимское сражение?", &collection(), Some(2))
            .await
            .unwrap();

        let calls = generator.calls.lock();
        assert_eq!(calls.len(), 1);
        let (query, context) = &calls[0];
        assert_eq!(query, "Когда произошло Цусимское сражение?");
        assert_eq!(context.len(), 2);
        assert!(context[0].contains("1905"));
        assert_eq!(answer, context.join(" | "));
    }

    #[tokio::test]
    async fn test_default_k_caps_context() {
        let generator = Arc::new(EchoGenerator::new(false));
        let rag = RagService::new(seeded_store().await, generator.clone()).with_default_k(1);

        rag.generate_answer("сражение", &collection(), None).await.unwrap();
        assert_eq!(generator.calls.lock()[0].1.len(), 1);
    }

    #[tokio::test]
    async fn test_pre_embedded_query_matches_store_embedding() {
        let store = seeded_store().await;
        let by_text = RagService::new(store.clone(), Arc::new(EchoGenerator::new(false)));
        let by_vector = RagService::new(store.clone(), Arc::new(EchoGenerator::new(false)))
            .with_query_embedder(store.embedder().clone());

        let a = by_text.retrieve("Порт-Артур", &collection(), 3).await.unwrap();
        let b = by_vector.retrieve("Порт-Артур", &collection(), 3).await.unwrap();
        let ids_a: Vec<_> = a.iter().map(|m| m.id.clone()).collect();
        let ids_b: Vec<_> = b.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[tokio::test]
    async fn test_empty_collection_still_generates() {
        let generator = Arc::new(EchoGenerator::new(false));
        let rag = RagService::new(seeded_store().await, generator.clone());
        let empty = CollectionName::new("empty").unwrap();

        let answer = rag.generate_answer("вопрос", &empty, None).await.unwrap();
        assert_eq!(answer, "");
        assert!(generator.calls.lock()[0].1.is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_is_tagged() {
        let rag = RagService::new(seeded_store().await, Arc::new(EchoGenerator::new(true)));
        let err = rag
            .generate_answer("вопрос", &collection(), None)
            .await
            .unwrap_err();
        assert_eq!(err.failed_in(), RequestState::Generating);
    }

    #[tokio::test]
    async fn test_retrieval_failure_is_tagged() {
        // A 3-dimensional query vector cannot be compared with 256-dimensional records
        let rag = RagService::new(seeded_store().await, Arc::new(EchoGenerator::new(false)))
            .with_query_embedder(Arc::new(HashingEmbedder::new(3).unwrap()));
        let err = rag
            .generate_answer("вопрос", &collection(), None)
            .await
            .unwrap_err();
        assert_eq!(err.failed_in(), RequestState::Retrieving);
    }

    #[tokio::test]
    async fn test_answer_or_fallback() {
        let failing = RagService::new(seeded_store().await, Arc::new(EchoGenerator::new(true)));
        assert_eq!(
            failing.answer_or_fallback("вопрос", &collection()).await,
            FALLBACK_ANSWER
        );

        let working = RagService::new(seeded_store().await, Arc::new(EchoGenerator::new(false)));
        assert_ne!(
            working.answer_or_fallback("сражение", &collection()).await,
            FALLBACK_ANSWER
        );
    }
}
