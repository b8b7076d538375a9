//! Core types for ragdesk.
//!
//! This crate holds the pieces every other ragdesk crate agrees on:
//!
//! - **Identifiers**: [`SessionId`] for streaming questions, [`DocumentId`] for backend documents
//! - **Wire types**: documents, search hits, citations and chat bodies
//! - **Stream events**: the decoded [`StreamEvent`] kinds of a chat stream
//! - **Error types**: [`CoreError`] and [`IdError`]
//!
//! # Example
//!
//! ```
//! use ragdesk_core::{SessionId, StreamEvent};
//!
//! let session = SessionId::generate();
//! let event = StreamEvent::Token { text: "FAISS".to_string() };
//! assert_eq!(event.kind(), "token");
//! assert_ne!(session, SessionId::generate());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod event;
pub mod ids;
pub mod types;

pub use error::{CoreError, IdError, Result};
pub use event::{StreamEvent, StreamFailure};
pub use ids::{DocumentId, SessionId};
pub use types::{
    ChatMeta, ChatRequest, ChatResponse, Chunk, Citation, Document, HealthStatus, IndexResult,
    SearchHit, SearchRequest, SearchResponse, TokenPayload,
};
