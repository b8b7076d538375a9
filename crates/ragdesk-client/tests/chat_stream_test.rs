//! Streaming chat endpoint tests.
//!
//! SSE bodies are served with `set_body_raw(bytes, "text/event-stream")` so
//! the content type is preserved exactly.

use std::time::Duration;

use ragdesk_client::{ChatStream, ClientConfig, RagClient};
use ragdesk_core::{StreamEvent, StreamFailure};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> RagClient {
    RagClient::new(ClientConfig::default().with_base_url(server.uri())).expect("client builds")
}

async fn drain(mut stream: ChatStream) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_secs(5), stream.next_event()).await
    {
        events.push(event);
    }
    events
}

fn sse(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream")
}

#[tokio::test]
async fn streams_tokens_meta_and_done_in_order() {
    let server = MockServer::start().await;
    let body = concat!(
        "event: token\ndata: {\"text\": \"FAISS\"}\n\n",
        "event: token\ndata: {\"text\": \" is a library.\"}\n\n",
        "event: meta\ndata: {\"provider\": \"openai\", \"model\": \"gpt\", \"latency_ms\": 420, ",
        "\"citations\": [{\"filename\": \"faiss.txt\", \"document_id\": \"a1\", \"chunk_id\": 1, ",
        "\"chunk_index\": 0, \"start_char\": 0, \"end_char\": 20, \"snippet\": \"FAISS\"}]}\n\n",
        "event: done\ndata: {}\n\n",
    );
    Mock::given(method("GET"))
        .and(path("/v1/chat/stream"))
        .and(query_param("question", "What is FAISS?"))
        .and(query_param("top_k", "5"))
        .and(header("accept", "text/event-stream"))
        .respond_with(sse(body))
        .expect(1)
        .mount(&server)
        .await;

    let stream = client_for(&server)
        .open_chat_stream("What is FAISS?", 5)
        .await
        .unwrap();
    let events = drain(stream).await;

    assert_eq!(events.len(), 4, "got {events:?}");
    assert_eq!(
        events[0],
        StreamEvent::Token {
            text: "FAISS".to_string()
        }
    );
    assert_eq!(
        events[1],
        StreamEvent::Token {
            text: " is a library.".to_string()
        }
    );
    match &events[2] {
        StreamEvent::Meta(meta) => {
            assert_eq!(meta.latency_ms, 420);
            assert_eq!(meta.citations[0].filename, "faiss.txt");
        }
        other => panic!("expected meta, got {other:?}"),
    }
    assert_eq!(events[3], StreamEvent::Done);
}

#[tokio::test]
async fn body_without_done_reports_closed_early() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/chat/stream"))
        .respond_with(sse("event: token\ndata: {\"text\": \"partial\"}\n\n"))
        .mount(&server)
        .await;

    let stream = client_for(&server).open_chat_stream("q", 3).await.unwrap();
    let events = drain(stream).await;

    assert_eq!(
        events.last(),
        Some(&StreamEvent::Error(StreamFailure::ClosedEarly))
    );
}

#[tokio::test]
async fn stream_open_failure_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/chat/stream"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client_for(&server).open_chat_stream("q", 3).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert!(err.to_string().starts_with("Stream failed: HTTP 503"));
}

#[tokio::test]
async fn unreachable_backend_fails_to_open() {
    let config = ClientConfig::default().with_base_url("http://127.0.0.1:1");
    let client = RagClient::new(config).unwrap();

    let err = client.open_chat_stream("q", 3).await.unwrap_err();
    assert!(err.is_retriable());
}
