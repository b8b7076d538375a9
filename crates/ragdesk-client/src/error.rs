//! Client error types.

use thiserror::Error;

/// A result type using `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while talking to the backend.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be sent or the connection failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("{operation} failed: HTTP {status}{}", format_detail(.message))]
    Api {
        /// Short name of the call (`List`, `Upload`, ...).
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Error detail from the body; empty when the body had none.
        message: String,
    },

    /// A 2xx body could not be decoded.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The request was rejected before being sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Reading a local file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_detail(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(" {message}")
    }
}

impl ClientError {
    /// HTTP status of an API error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            Self::Parse(_) | Self::InvalidRequest(_) | Self::Io(_) => None,
        }
    }

    /// Returns true if a manual retry might succeed.
    ///
    /// The client itself never retries.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Http(err) => err.is_connect() || err.is_timeout(),
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            Self::Parse(_) | Self::InvalidRequest(_) | Self::Io(_) => false,
        }
    }
}
