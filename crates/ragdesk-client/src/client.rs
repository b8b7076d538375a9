//! HTTP client for the RAG backend REST API.
//!
//! Request/response calls share one connection pool and carry the configured
//! request timeout; the chat stream is exempt because it stays open for as
//! long as the answer is being generated. No call is retried.

use std::path::Path;

use ragdesk_core::{
    ChatRequest, ChatResponse, Chunk, Document, DocumentId, HealthStatus, IndexResult,
    SearchRequest, SearchResponse,
};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::stream::ChatStream;

/// Longest question or query the backend accepts, in characters.
pub const MAX_TEXT_CHARS: usize = 2000;
/// Largest `top_k` accepted by `/v1/search`.
pub const MAX_SEARCH_TOP_K: u32 = 20;
/// Largest `top_k` accepted by `/v1/chat` and `/v1/chat/stream`.
pub const MAX_CHAT_TOP_K: u32 = 10;

/// Error body shape used by the backend (`{"detail": ...}`).
#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Client for the RAG backend.
#[derive(Debug, Clone)]
pub struct RagClient {
    client: Client,
    config: ClientConfig,
    base_url: String,
}

impl RagClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create a client around an existing `reqwest::Client`.
    #[must_use]
    pub fn with_client(client: Client, config: ClientConfig) -> Self {
        let base_url = config.normalized_base_url().to_string();
        Self {
            client,
            config,
            base_url,
        }
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(self.url(path))
            .timeout(self.config.request_timeout())
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(self.url(path))
            .timeout(self.config.request_timeout())
    }

    /// Turn a non-2xx response into `ClientError::Api`.
    async fn handle_error(operation: &'static str, response: Response) -> ClientError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(ErrorBody {
                detail: serde_json::Value::String(detail),
            }) => detail,
            Ok(ErrorBody { detail }) => detail.to_string(),
            Err(_) => body.trim().to_string(),
        };
        debug!(operation, status, message = %message, "Backend returned an error");
        ClientError::Api {
            operation,
            status,
            message,
        }
    }

    async fn send_json<T: DeserializeOwned>(
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(operation, response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// List uploaded documents.
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        Self::send_json("List", self.get("/v1/documents")).await
    }

    /// Upload a file from disk.
    ///
    /// The content type is guessed from the file extension.
    pub async fn upload_document(&self, path: &Path) -> Result<Document> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                ClientError::InvalidRequest(format!("not a file path: {}", path.display()))
            })?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        let content_type = guess_content_type(&filename);
        self.upload_bytes(&filename, bytes, content_type).await
    }

    /// Upload in-memory content as multipart field `file`.
    pub async fn upload_bytes(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<Document> {
        if filename.trim().is_empty() {
            return Err(ClientError::InvalidRequest(
                "filename must not be empty".to_string(),
            ));
        }

        let size = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(content_type)?;
        let form = Form::new().part("file", part);

        let document: Document =
            Self::send_json("Upload", self.post("/v1/documents").multipart(form)).await?;
        info!(document_id = %document.id, filename, size, "Uploaded document");
        Ok(document)
    }

    /// List the chunks of one document.
    pub async fn list_chunks(&self, document_id: &DocumentId) -> Result<Vec<Chunk>> {
        let path = format!("/v1/documents/{document_id}/chunks");
        Self::send_json("Chunks", self.get(&path)).await
    }

    /// Chunk and embed a document. Returns the number of chunks indexed.
    pub async fn index_document(&self, document_id: &DocumentId) -> Result<u64> {
        let path = format!("/v1/documents/{document_id}/index");
        let result: IndexResult = Self::send_json("Index", self.post(&path)).await?;
        info!(document_id = %document_id, indexed = result.indexed, "Indexed document");
        Ok(result.indexed)
    }

    // =========================================================================
    // Search and chat
    // =========================================================================

    /// Similarity search over indexed chunks.
    ///
    /// Hits come back ordered by descending score. An empty hit list is a
    /// valid result.
    pub async fn search_chunks(&self, query: &str, top_k: u32) -> Result<SearchResponse> {
        let request = SearchRequest {
            query: validate_text("query", query)?.to_string(),
            top_k: validate_top_k(top_k, MAX_SEARCH_TOP_K)?,
        };

        let mut response: SearchResponse =
            Self::send_json("Search", self.post("/v1/search").json(&request)).await?;
        response.sort_hits();
        debug!(hits = response.hits.len(), top_k, "Search completed");
        Ok(response)
    }

    /// Ask a question and wait for the complete answer.
    pub async fn chat(&self, question: &str, top_k: u32) -> Result<ChatResponse> {
        let request = ChatRequest {
            question: validate_text("question", question)?.to_string(),
            top_k: validate_top_k(top_k, MAX_CHAT_TOP_K)?,
        };
        Self::send_json("Chat", self.post("/v1/chat").json(&request)).await
    }

    /// Open the streaming chat endpoint.
    ///
    /// Resolves once response headers arrive; events are then read on a
    /// background task owned by the returned stream.
    pub async fn open_chat_stream(&self, question: &str, top_k: u32) -> Result<ChatStream> {
        let question = validate_text("question", question)?;
        let top_k = validate_top_k(top_k, MAX_CHAT_TOP_K)?;

        let response = self
            .client
            .get(self.url("/v1/chat/stream"))
            .query(&[("question", question.to_string()), ("top_k", top_k.to_string())])
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error("Stream", response).await);
        }

        debug!(top_k, "Chat stream opened");
        Ok(ChatStream::spawn(response.bytes_stream()))
    }

    /// Backend liveness probe.
    pub async fn health(&self) -> Result<HealthStatus> {
        Self::send_json("Health", self.get("/health")).await
    }
}

/// Trim and bound-check a question or query.
fn validate_text<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ClientError::InvalidRequest(format!(
            "{field} must not be empty"
        )));
    }
    if trimmed.chars().count() > MAX_TEXT_CHARS {
        return Err(ClientError::InvalidRequest(format!(
            "{field} must be at most {MAX_TEXT_CHARS} characters"
        )));
    }
    Ok(trimmed)
}

fn validate_top_k(top_k: u32, max: u32) -> Result<u32> {
    if (1..=max).contains(&top_k) {
        Ok(top_k)
    } else {
        Err(ClientError::InvalidRequest(format!(
            "top_k must be between 1 and {max}, got {top_k}"
        )))
    }
}

/// Content type for an upload, from the filename extension.
#[must_use]
pub fn guess_content_type(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("txt" | "text" | "log") => "text/plain",
        Some("md" | "markdown") => "text/markdown",
        Some("csv") => "text/csv",
        Some("html" | "htm") => "text/html",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let config = ClientConfig::default().with_base_url("http://localhost:8000///");
        let client = RagClient::new(config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/health"), "http://localhost:8000/health");
    }

    #[test]
    fn validate_text_trims_and_bounds() {
        assert_eq!(validate_text("question", "  hi  ").unwrap(), "hi");
        assert!(validate_text("question", "   ").is_err());

        let long = "é".repeat(MAX_TEXT_CHARS);
        assert!(validate_text("question", &long).is_ok());
        let too_long = "a".repeat(MAX_TEXT_CHARS + 1);
        assert!(validate_text("question", &too_long).is_err());
    }

    #[test]
    fn validate_top_k_ranges() {
        assert!(validate_top_k(0, MAX_CHAT_TOP_K).is_err());
        assert_eq!(validate_top_k(10, MAX_CHAT_TOP_K).unwrap(), 10);
        assert!(validate_top_k(11, MAX_CHAT_TOP_K).is_err());
        assert_eq!(validate_top_k(20, MAX_SEARCH_TOP_K).unwrap(), 20);
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(guess_content_type("notes.TXT"), "text/plain");
        assert_eq!(guess_content_type("paper.pdf"), "application/pdf");
        assert_eq!(guess_content_type("README.md"), "text/markdown");
        assert_eq!(guess_content_type("blob"), "application/octet-stream");
    }
}
