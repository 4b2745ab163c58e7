//! Seeding the index from the verse service.

use std::sync::Arc;

use logos_embeddings::StaticProvider;
use logos_retrieval::{RetrievalConfig, RetrievalError, SearchRequest, SearchService, VerseClient};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chapter(book: &str, texts: &[&str]) -> serde_json::Value {
    let verses: Vec<serde_json::Value> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            serde_json::json!({
                "book_name": book,
                "chapter": 1,
                "verse": i + 1,
                "text": text
            })
        })
        .collect();
    serde_json::json!({
        "reference": format!("{book} 1"),
        "text": texts.join(" "),
        "translation_name": "World English Bible",
        "verses": verses
    })
}

fn config(sample_books: usize) -> RetrievalConfig {
    let mut config = RetrievalConfig::default();
    config.verses.sample_books = sample_books;
    config.verses.verses_per_chapter = 2;
    config
}

#[tokio::test]
async fn test_initialize_then_search() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Genesis%201"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chapter(
            "Genesis",
            &[
                "In the beginning God created the heavens and the earth.",
                "The earth was formless and empty.",
                "God said, Let there be light.",
            ],
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Exodus%201"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chapter(
            "Exodus",
            &["Now these are the names of the sons of Israel.", "Reuben, Simeon, Levi, and Judah,"],
        )))
        .mount(&server)
        .await;

    let provider = StaticProvider::new(2)
        .with_vector(
            "In the beginning God created the heavens and the earth.",
            vec![1.0, 0.0],
        )
        .with_vector("The earth was formless and empty.", vec![0.8, 0.6])
        .with_vector("Now these are the names of the sons of Israel.", vec![0.0, 1.0])
        .with_vector("creation", vec![0.9, 0.1])
        .fail_on("Reuben, Simeon, Levi, and Judah,");

    let service = SearchService::builder()
        .with_config(config(2))
        .with_provider(Arc::new(provider))
        .with_verse_client(VerseClient::new().with_base_url(server.uri()))
        .build()
        .unwrap();

    let summary = service.initialize_embeddings().await.unwrap();
    assert_eq!(summary.processed, 4);
    assert_eq!(summary.successful, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.total_stored, 3);

    let status = service.status().await;
    assert!(status.ready);
    assert_eq!(status.stored, 3);

    let response = service
        .search(SearchRequest::new("creation"))
        .await
        .unwrap();
    let ids: Vec<&str> = response.results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["Genesis_1_1", "Genesis_1_2"]);
    assert_eq!(response.count, 2);
    assert_eq!(
        response.results[0].metadata.reference.as_deref(),
        Some("Genesis 1:1")
    );

    let summary_json = serde_json::to_value(&summary).unwrap();
    assert_eq!(summary_json["totalStored"], 3);
}

#[tokio::test]
async fn test_initialize_without_sample_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let service = SearchService::builder()
        .with_config(config(3))
        .with_provider(Arc::new(StaticProvider::new(2)))
        .with_verse_client(VerseClient::new().with_base_url(server.uri()))
        .build()
        .unwrap();

    let err = service.initialize_embeddings().await.unwrap_err();
    assert!(matches!(err, RetrievalError::NoSampleData));
    assert_eq!(err.status_code(), 400);
    assert!(!service.status().await.ready);
}

#[tokio::test]
async fn test_lookup_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let service = SearchService::builder()
        .with_provider(Arc::new(StaticProvider::new(2)))
        .with_verse_client(VerseClient::new().with_base_url(server.uri()))
        .build()
        .unwrap();

    let err = service.lookup("Hezekiah 4:2").await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}
