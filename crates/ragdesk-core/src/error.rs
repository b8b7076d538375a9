//! Common error types for ragdesk.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The string is not a valid UUID.
    #[error("invalid UUID")]
    InvalidUuid,

    /// The identifier is empty.
    #[error("identifier must not be empty")]
    Empty,
}

/// Core errors shared across the ragdesk crates.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// A structured payload could not be decoded.
    #[error("malformed {kind} payload: {source}")]
    MalformedPayload {
        /// Which event or body was being decoded.
        kind: &'static str,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}
