use history_rag::infrastructure::embeddings::{
    EmbeddingError, EmbeddingProvider, GigaChatEmbeddings,
};
use history_rag::infrastructure::gigachat::{GigaChatClient, GigaChatConfig, GigaChatError};
use history_rag::infrastructure::llm::{AnswerGenerator, GigaChatAnswerGenerator, SYSTEM_PROMPT};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_token(server: &MockServer, expected_calls: u64) {
    let expires_at = chrono::Utc::now().timestamp_millis() + 30 * 60 * 1000;
    Mock::given(method("POST"))
        .and(path("/api/v2/oauth"))
        .and(header("authorization", "Basic dGVzdDpzZWNyZXQ="))
        .and(header_exists("RqUID"))
        .and(body_string_contains("scope=GIGACHAT_API_PERS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token-123",
            "expires_at": expires_at
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn client(server: &MockServer) -> Arc<GigaChatClient> {
    let config = GigaChatConfig {
        credentials: "dGVzdDpzZWNyZXQ=".to_string(),
        auth_url: format!("{}/api/v2/oauth", server.uri()),
        base_url: format!("{}/api/v1", server.uri()),
        timeout: Duration::from_secs(5),
        ..GigaChatConfig::default()
    };
    Arc::new(GigaChatClient::new(config).unwrap())
}

#[tokio::test]
async fn test_embeddings_are_reordered_by_index() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/embeddings"))
        .and(header("authorization", "Bearer token-123"))
        .and(body_partial_json(json!({
            "model": "Embeddings",
            "input": ["первый", "второй"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [
                { "object": "embedding", "embedding": [0.0, 1.0, 0.0], "index": 1 },
                { "object": "embedding", "embedding": [1.0, 0.0, 0.0], "index": 0 }
            ],
            "model": "Embeddings"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let embeddings = GigaChatEmbeddings::with_dimensions(client(&server), 3);
    let texts = vec!["первый".to_string(), "второй".to_string()];

    let vectors = embeddings.embed(&texts).await.unwrap();
    assert_eq!(vectors[0].dimensions(), &[1.0, 0.0, 0.0]);
    assert_eq!(vectors[1].dimensions(), &[0.0, 1.0, 0.0]);

    // Second call reuses the cached token
    embeddings.embed(&texts).await.unwrap();
}

#[tokio::test]
async fn test_embedding_dimension_mismatch() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "embedding": [0.5, 0.5], "index": 0 }]
        })))
        .mount(&server)
        .await;

    let embeddings = GigaChatEmbeddings::new(client(&server));
    let result = embeddings.embed_query("Варяг").await;
    assert!(matches!(result, Err(EmbeddingError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_embedding_count_mismatch() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "embedding": [0.5, 0.5], "index": 0 }]
        })))
        .mount(&server)
        .await;

    let embeddings = GigaChatEmbeddings::with_dimensions(client(&server), 2);
    let result = embeddings
        .embed(&["один".to_string(), "два".to_string()])
        .await;
    assert!(matches!(
        result,
        Err(EmbeddingError::CountMismatch {
            expected: 2,
            actual: 1
        })
    ));
}

#[tokio::test]
async fn test_upstream_error_surfaces_as_embedding_error() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/embeddings"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let embeddings = GigaChatEmbeddings::new(client(&server));
    let result = embeddings.embed_query("Цусима").await;

    // No internal retry: exactly one request reached the endpoint
    assert!(matches!(
        result,
        Err(EmbeddingError::Remote(GigaChatError::Status { status: 503, .. }))
    ));
}

#[tokio::test]
async fn test_authentication_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/oauth"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let embeddings = GigaChatEmbeddings::new(client(&server));
    let result = embeddings.embed_query("Мукден").await;
    assert!(matches!(
        result,
        Err(EmbeddingError::Remote(GigaChatError::Auth(_)))
    ));
}

#[tokio::test]
async fn test_chat_completion_message_layout() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(body_partial_json(json!({
            "model": "GigaChat",
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "assistant", "content": "Фрагмент один.\nФрагмент два." },
                { "role": "user", "content": "Когда произошло Цусимское сражение?" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [
                {
                    "message": { "role": "assistant", "content": "В мае 1905 года." },
                    "index": 0,
                    "finish_reason": "stop"
                }
            ],
            "model": "GigaChat"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generator = GigaChatAnswerGenerator::new(client(&server));
    let answer = generator
        .generate(
            "Когда произошло Цусимское сражение?",
            &["Фрагмент один.".to_string(), "Фрагмент два.".to_string()],
        )
        .await
        .unwrap();

    assert_eq!(answer, "В мае 1905 года.");
}

#[tokio::test]
async fn test_chat_completion_without_choices() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let generator = GigaChatAnswerGenerator::new(client(&server));
    let result = generator.generate("вопрос", &[]).await;
    assert!(result.is_err());
}
