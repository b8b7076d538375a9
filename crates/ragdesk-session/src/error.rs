//! Error types for streaming sessions.

use ragdesk_client::ClientError;
use thiserror::Error;

use crate::state::SessionState;

/// A result type using `SessionError`.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors raised by or recorded on a streaming session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The stream connection could not be established.
    #[error("could not open answer stream: {0}")]
    StreamOpen(#[source] ClientError),

    /// The stream failed after it was opened.
    #[error("answer stream failed: {0}")]
    Stream(String),

    /// A second `meta` event arrived for the same session.
    #[error("received a second meta event for the same answer")]
    DuplicateMeta,

    /// The requested state transition is not valid.
    #[error("invalid session transition: cannot go from {from} to {to}")]
    InvalidTransition {
        /// The current state.
        from: SessionState,
        /// The requested target state.
        to: SessionState,
    },

    /// An empty question was submitted.
    #[error("question must not be empty")]
    EmptyQuestion,
}

impl SessionError {
    /// Returns true if asking the same question again might succeed.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::StreamOpen(err) => err.is_retriable(),
            Self::Stream(_) => true,
            Self::DuplicateMeta | Self::InvalidTransition { .. } | Self::EmptyQuestion => false,
        }
    }

    /// Returns true if the backend broke the event contract.
    #[must_use]
    pub const fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::DuplicateMeta)
    }
}
