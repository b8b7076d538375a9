//! Wire types for the RAG backend API.
//!
//! These mirror the JSON bodies exchanged with the backend. They are plain
//! snapshots: the client never mutates them after decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::DocumentId;

// =============================================================================
// Documents
// =============================================================================

/// An uploaded document as listed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Backend-assigned identifier.
    pub id: DocumentId,
    /// Sanitized file name.
    pub filename: String,
    /// MIME type recorded at upload.
    pub content_type: String,
    /// Storage path on the backend host.
    pub storage_path: String,
    /// Upload timestamp.
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// One chunk of an ingested document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk identifier, unique within the backend.
    pub id: u64,
    /// Owning document.
    pub document_id: DocumentId,
    /// Position of the chunk inside its document.
    pub chunk_index: u32,
    /// Chunk text.
    pub text: String,
    /// Start offset in the source text, if known.
    #[serde(default)]
    pub start_char: Option<u64>,
    /// End offset in the source text, if known.
    #[serde(default)]
    pub end_char: Option<u64>,
}

/// Result of asking the backend to embed a document's chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexResult {
    /// Number of chunks newly added to the vector index.
    pub indexed: u64,
}

// =============================================================================
// Search
// =============================================================================

/// Body of `POST /v1/search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query.
    pub query: String,
    /// Maximum number of hits.
    pub top_k: u32,
}

/// A scored chunk returned by similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Similarity score; higher is closer.
    pub score: f64,
    /// Chunk identifier.
    pub chunk_id: u64,
    /// Owning document.
    pub document_id: DocumentId,
    /// Owning document's file name.
    pub filename: String,
    /// Position of the chunk inside its document.
    pub chunk_index: u32,
    /// Chunk text.
    pub text: String,
    /// Start offset in the source text, if known.
    #[serde(default)]
    pub start_char: Option<u64>,
    /// End offset in the source text, if known.
    #[serde(default)]
    pub end_char: Option<u64>,
    /// Owning document's upload timestamp.
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Response of `POST /v1/search`.
///
/// An empty `hits` list is a valid "no matches" answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Echo of the query.
    pub query: String,
    /// Echo of the requested hit count.
    pub top_k: u32,
    /// Embedding model used for the query vector.
    pub embedding_model: String,
    /// Hits ordered by descending score.
    pub hits: Vec<SearchHit>,
}

impl SearchResponse {
    /// Re-sort hits by descending score.
    ///
    /// The backend already sorts, but the ordering is part of the client
    /// contract so it is enforced on receipt. `NaN` scores sink to the end.
    pub fn sort_hits(&mut self) {
        self.hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or_else(|| a.score.is_nan().cmp(&b.score.is_nan()))
        });
    }
}

// =============================================================================
// Chat
// =============================================================================

/// A chunk reference attached to a generated answer.
///
/// Position in the citation list is the display rank: the first citation
/// is referenced as `[1]` in the answer text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Source file name.
    pub filename: String,
    /// Source document.
    pub document_id: DocumentId,
    /// Source chunk.
    pub chunk_id: u64,
    /// Position of the chunk inside its document.
    pub chunk_index: u32,
    /// Start offset in the source text, if known.
    #[serde(default)]
    pub start_char: Option<u64>,
    /// End offset in the source text, if known.
    #[serde(default)]
    pub end_char: Option<u64>,
    /// Short excerpt of the chunk.
    pub snippet: String,
}

/// Body of `POST /v1/chat`; also the query of `GET /v1/chat/stream`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The question.
    pub question: String,
    /// Number of chunks to retrieve as context.
    pub top_k: u32,
}

/// Final answer metadata, carried by the `meta` stream event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMeta {
    /// LLM provider name (e.g. `ollama`).
    pub provider: String,
    /// Model name.
    pub model: String,
    /// End-to-end backend latency in milliseconds.
    pub latency_ms: u64,
    /// Ranked citations.
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl ChatMeta {
    /// `provider / model` label used by the views.
    #[must_use]
    pub fn model_label(&self) -> String {
        format!("{} / {}", self.provider, self.model)
    }
}

/// Response of the non-streaming `POST /v1/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Complete answer text.
    pub answer: String,
    /// LLM provider name.
    pub provider: String,
    /// Model name.
    pub model: String,
    /// End-to-end backend latency in milliseconds.
    pub latency_ms: u64,
    /// Ranked citations.
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl ChatResponse {
    /// Split into answer text and the same metadata a stream would carry.
    #[must_use]
    pub fn into_parts(self) -> (String, ChatMeta) {
        (
            self.answer,
            ChatMeta {
                provider: self.provider,
                model: self.model,
                latency_ms: self.latency_ms,
                citations: self.citations,
            },
        )
    }
}

/// Payload of a `token` stream event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    /// Answer fragment, whitespace included.
    pub text: String,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// `ok` when the backend is up.
    pub status: String,
}

impl HealthStatus {
    /// Whether the backend reported itself healthy.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

/// Backend timestamps come without an offset; they are UTC.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub(super) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }
}
