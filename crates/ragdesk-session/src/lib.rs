//! Streaming answer sessions for ragdesk.
//!
//! This crate turns an ordered stream of decoded chat events into answer
//! state, and guarantees that at most one answer stream is open at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       View (TUI / CLI)                      │
//! └─────────────────────────────────────────────────────────────┘
//!            │ ask / cancel / teardown        ▲ snapshot
//!            ▼                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     SessionController                       │
//! │  ┌──────────────────┐ ┌──────────────┐ ┌────────────────┐  │
//! │  │ StreamingSession │ │ Stale-event  │ │  State Machine │  │
//! │  │ (answer, meta)   │ │ guard        │ │                │  │
//! │  └──────────────────┘ └──────────────┘ └────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ ChatTransport
//!                              ▼
//!                      ┌───────────────┐
//!                      │   RagClient   │
//!                      └───────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use ragdesk_client::{ClientConfig, RagClient};
//! use ragdesk_session::SessionController;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RagClient::new(ClientConfig::default())?;
//! let (mut controller, mut events) = SessionController::channel(client);
//!
//! controller.ask("What is FAISS?", 5).await?;
//! while controller.is_busy() {
//!     let Some(event) = events.recv().await else { break };
//!     controller.apply_event(event);
//! }
//!
//! let view = controller.snapshot();
//! println!("{} ({})", view.answer, view.state);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod controller;
pub mod error;
pub mod session;
pub mod state;
pub mod transport;

pub use controller::{SessionController, SessionEvent, SessionView, EVENT_CHANNEL_CAPACITY};
pub use error::{Result, SessionError};
pub use session::{Applied, StreamingSession};
pub use state::SessionState;
pub use transport::ChatTransport;
