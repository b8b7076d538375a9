//! REST endpoint tests against a `wiremock` backend.

use std::io::Write;

use chrono::NaiveDate;
use ragdesk_client::{ClientConfig, ClientError, RagClient};
use ragdesk_core::DocumentId;
use serde_json::json;
use wiremock::matchers::{body_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> RagClient {
    RagClient::new(ClientConfig::default().with_base_url(format!("{}/", server.uri())))
        .expect("client builds")
}

fn document_json(id: &str, filename: &str) -> serde_json::Value {
    json!({
        "id": id,
        "filename": filename,
        "content_type": "text/plain",
        "storage_path": format!("data/uploads/{id}_{filename}"),
        "created_at": "2024-05-01T12:30:00.123456"
    })
}

#[tokio::test]
async fn list_documents_parses_naive_timestamps() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            document_json("a1", "faiss.txt"),
            document_json("b2", "notes.md"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let documents = client_for(&server).list_documents().await.unwrap();

    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].id.as_str(), "a1");
    assert_eq!(documents[1].filename, "notes.md");
    let expected = NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|d| d.and_hms_micro_opt(12, 30, 0, 123_456))
        .unwrap()
        .and_utc();
    assert_eq!(documents[0].created_at, expected);
}

#[tokio::test]
async fn list_documents_non_2xx_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/documents"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client_for(&server).list_documents().await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(err.to_string(), "List failed: HTTP 500 boom");
}

#[tokio::test]
async fn upload_sends_multipart_file_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/documents"))
        .and(header_exists("content-type"))
        .respond_with(ResponseTemplate::new(200).set_body_json(document_json("c3", "faiss.txt")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("faiss.txt");
    let mut file = std::fs::File::create(&file_path).unwrap();
    writeln!(file, "FAISS is a library for efficient similarity search.").unwrap();

    let document = client_for(&server).upload_document(&file_path).await.unwrap();
    assert_eq!(document.id.as_str(), "c3");

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0].headers.get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"file\""));
    assert!(body.contains("filename=\"faiss.txt\""));
    assert!(body.contains("efficient similarity search"));
}

#[tokio::test]
async fn upload_error_carries_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/documents"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "Missing filename"})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .upload_bytes("a.txt", b"hi".to_vec(), "text/plain")
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Upload failed: HTTP 400 Missing filename");
}

#[tokio::test]
async fn upload_missing_file_is_io_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let err = client_for(&server)
        .upload_document(&dir.path().join("absent.txt"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Io(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn index_and_chunks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/documents/a1/index"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"indexed": 4})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/documents/a1/chunks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 10, "document_id": "a1", "chunk_index": 0, "text": "first",
             "start_char": 0, "end_char": 5},
            {"id": 11, "document_id": "a1", "chunk_index": 1, "text": "second",
             "start_char": null, "end_char": null}
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let id = DocumentId::new("a1").unwrap();

    assert_eq!(client.index_document(&id).await.unwrap(), 4);
    let chunks = client.list_chunks(&id).await.unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[1].chunk_index, 1);
    assert_eq!(chunks[1].start_char, None);
}

#[tokio::test]
async fn search_posts_json_and_orders_hits() {
    let server = MockServer::start().await;
    let hit = |score: f64, chunk_id: u64| {
        json!({
            "score": score, "chunk_id": chunk_id, "document_id": "a1",
            "filename": "faiss.txt", "chunk_index": chunk_id, "text": "chunk",
            "start_char": 0, "end_char": 5, "created_at": "2024-05-01T12:30:00"
        })
    };
    Mock::given(method("POST"))
        .and(path("/v1/search"))
        .and(body_json(json!({"query": "faiss", "top_k": 3})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": "faiss", "top_k": 3, "embedding_model": "all-MiniLM-L6-v2",
            "hits": [hit(0.2, 1), hit(0.9, 2), hit(0.5, 3)]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server).search_chunks("  faiss ", 3).await.unwrap();

    let scores: Vec<f64> = response.hits.iter().map(|h| h.score).collect();
    assert_eq!(scores, vec![0.9, 0.5, 0.2]);
    assert_eq!(response.embedding_model, "all-MiniLM-L6-v2");
}

#[tokio::test]
async fn search_with_no_hits_is_ok() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": "nothing", "top_k": 5, "embedding_model": "m", "hits": []
        })))
        .mount(&server)
        .await;

    let response = client_for(&server).search_chunks("nothing", 5).await.unwrap();
    assert!(response.hits.is_empty());
}

#[tokio::test]
async fn invalid_requests_are_rejected_locally() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    assert!(matches!(
        client.search_chunks("", 5).await,
        Err(ClientError::InvalidRequest(_))
    ));
    assert!(matches!(
        client.search_chunks("q", 21).await,
        Err(ClientError::InvalidRequest(_))
    ));
    assert!(matches!(
        client.chat("q", 11).await,
        Err(ClientError::InvalidRequest(_))
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn chat_returns_answer_and_citations() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat"))
        .and(body_json(json!({"question": "What is FAISS?", "top_k": 5})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "FAISS is a library. [1]",
            "provider": "ollama", "model": "llama3", "latency_ms": 812,
            "citations": [{"filename": "faiss.txt", "document_id": "a1", "chunk_id": 2,
                           "chunk_index": 0, "start_char": 0, "end_char": 40,
                           "snippet": "FAISS is a library"}]
        })))
        .mount(&server)
        .await;

    let response = client_for(&server).chat("What is FAISS?", 5).await.unwrap();
    let (answer, meta) = response.into_parts();

    assert_eq!(answer, "FAISS is a library. [1]");
    assert_eq!(meta.model_label(), "ollama / llama3");
    assert_eq!(meta.citations.len(), 1);
}

#[tokio::test]
async fn health_reports_ok() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    assert!(client_for(&server).health().await.unwrap().is_ok());
}

#[tokio::test]
async fn unparseable_body_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).health().await.unwrap_err();
    assert!(matches!(err, ClientError::Parse(_)));
}
