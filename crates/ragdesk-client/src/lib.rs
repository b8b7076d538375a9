//! Client for the RAG backend.
//!
//! [`RagClient`] wraps the REST endpoints (documents, chunks, indexing,
//! search, chat, health) and opens the streaming chat endpoint as a
//! [`ChatStream`]. Chat event mapping lives in [`sse`].
//!
//! # Example
//!
//! ```no_run
//! use ragdesk_client::{ClientConfig, RagClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RagClient::new(ClientConfig::from_env())?;
//! let hits = client.search_chunks("what is FAISS?", 5).await?;
//! for hit in hits.hits {
//!     println!("{:.3} {}", hit.score, hit.filename);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod sse;
pub mod stream;

pub use client::{guess_content_type, RagClient, MAX_CHAT_TOP_K, MAX_SEARCH_TOP_K, MAX_TEXT_CHARS};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use stream::{ChatStream, ConnectionHandle};
