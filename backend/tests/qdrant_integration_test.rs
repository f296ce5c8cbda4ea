/// Document store over a live Qdrant server
///
/// All tests need a running Qdrant instance:
/// docker run -p 6333:6333 -p 6334:6334 qdrant/qdrant
use history_rag::application::services::{DocumentStore, COLLECTION_DESCRIPTION};
use history_rag::domain::entities::ChunkMetadata;
use history_rag::domain::value_objects::{CollectionName, MetadataFilter, RecordId};
use history_rag::infrastructure::embeddings::HashingEmbedder;
use history_rag::infrastructure::vector_store::QdrantVectorStore;
use std::sync::Arc;

fn store() -> DocumentStore {
    DocumentStore::new(
        Arc::new(QdrantVectorStore::new_local().unwrap()),
        Arc::new(HashingEmbedder::new(128).unwrap()),
    )
}

fn unique_collection() -> CollectionName {
    CollectionName::new(format!("history_test_{}", uuid::Uuid::new_v4().simple())).unwrap()
}

fn chunk(path: &str, topic: &str, text: &str) -> ChunkMetadata {
    let mut metadata = ChunkMetadata::for_text(path, topic, text);
    metadata.filename = format!("{}_1", topic);
    metadata
}

#[tokio::test]
#[ignore] // Requires running Qdrant instance
async fn test_store_and_query_round_trip() {
    let store = store();
    let collection = unique_collection();

    let texts = vec![
        "Цусимское сражение произошло в мае 1905 года.".to_string(),
        "Крейсер Варяг принял бой у Чемульпо.".to_string(),
    ];
    let metadatas = vec![
        chunk("docs/cleaned_tsushima_1.txt", "tsushima", &texts[0]),
        chunk("docs/cleaned_varyag_1.txt", "varyag", &texts[1]),
    ];
    store
        .add_documents(&collection, texts, metadatas)
        .await
        .unwrap();

    let matches = store
        .query(&collection, "Крейсер Варяг", 2, &MetadataFilter::new())
        .await
        .unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].metadata.topic, "varyag");
    assert_eq!(matches[0].metadata.filename, "varyag_1");
    assert!(matches[0].distance <= matches[1].distance);

    let stats = store.stats(&collection).await.unwrap();
    assert_eq!(stats.count, 2);
    assert_eq!(stats.metadata["description"], COLLECTION_DESCRIPTION);
    assert_eq!(stats.metadata["dimension"], "128");

    assert!(store.delete(&collection).await.unwrap());
}

#[tokio::test]
#[ignore] // Requires running Qdrant instance
async fn test_topics_and_source_lookup() {
    let store = store();
    let collection = unique_collection();

    let texts = vec![
        "Оборона Порт-Артура.".to_string(),
        "Сдача крепости.".to_string(),
        "Бой у Чемульпо.".to_string(),
    ];
    let metadatas = vec![
        chunk("docs/cleaned_port_arthur_1.txt", "port_arthur", &texts[0]),
        chunk("docs/cleaned_port_arthur_1.txt", "port_arthur", &texts[1]),
        chunk("docs/cleaned_varyag_1.txt", "varyag", &texts[2]),
    ];
    store
        .add_documents(&collection, texts, metadatas)
        .await
        .unwrap();

    assert_eq!(
        store.unique_topics(&collection).await.unwrap(),
        vec!["port_arthur".to_string(), "varyag".to_string()]
    );
    assert_eq!(
        store
            .documents_by_topic(&collection, "port_arthur", 10)
            .await
            .unwrap()
            .len(),
        2
    );
    assert!(store
        .exists_by_source(&collection, "docs/cleaned_varyag_1.txt")
        .await
        .unwrap());
    assert!(!store
        .exists_by_source(&collection, "docs/cleaned_mukden_1.txt")
        .await
        .unwrap());

    let _ = store.delete(&collection).await;
}

#[tokio::test]
#[ignore] // Requires running Qdrant instance
async fn test_caller_ids_are_preserved_and_replaced() {
    let store = store();
    let collection = unique_collection();
    let id = RecordId::new("tsushima-chunk-0").unwrap();

    store
        .upsert(
            &collection,
            vec!["Первая версия.".to_string()],
            vec![chunk("a.txt", "tsushima", "Первая версия.")],
            Some(vec![id.clone()]),
        )
        .await
        .unwrap();
    store
        .upsert(
            &collection,
            vec!["Вторая версия.".to_string()],
            vec![chunk("a.txt", "tsushima", "Вторая версия.")],
            Some(vec![id.clone()]),
        )
        .await
        .unwrap();

    let docs = store
        .documents_by_topic(&collection, "tsushima", 10)
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, id);
    assert_eq!(docs[0].text, "Вторая версия.");

    let _ = store.delete(&collection).await;
}

#[tokio::test]
#[ignore] // Requires running Qdrant instance
async fn test_new_collection_is_empty_and_delete_is_idempotent() {
    let store = store();
    let collection = unique_collection();

    let stats = store.stats(&collection).await.unwrap();
    assert_eq!(stats.count, 0);
    assert!(store
        .query(&collection, "вопрос", 5, &MetadataFilter::new())
        .await
        .unwrap()
        .is_empty());

    assert!(store.delete(&collection).await.unwrap());
    assert!(!store.delete(&collection).await.unwrap());
}

#[tokio::test]
#[ignore] // Requires running Qdrant instance
async fn test_concurrent_first_writes_share_collection() {
    let first = store();
    let second = store();
    let collection = unique_collection();

    let varyag = "Бой у Чемульпо.".to_string();
    let tsushima = "Цусимское сражение.".to_string();
    let (a, b) = tokio::join!(
        first.add_documents(
            &collection,
            vec![varyag.clone()],
            vec![chunk("a.txt", "varyag", &varyag)],
        ),
        second.add_documents(
            &collection,
            vec![tsushima.clone()],
            vec![chunk("b.txt", "tsushima", &tsushima)],
        )
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(first.stats(&collection).await.unwrap().count, 2);

    let _ = first.delete(&collection).await;
}
