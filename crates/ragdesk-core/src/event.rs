//! Decoded chat stream events.
//!
//! The backend's event stream carries three named events (`token`, `meta`,
//! `done`); transport-level trouble surfaces as a fourth kind, [`StreamEvent::Error`].
//! Events are delivered in arrival order and are never reordered or merged.

use std::fmt;

use crate::types::ChatMeta;

/// One decoded event from a chat stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental answer fragment. Fragments concatenate with no separator.
    Token {
        /// Fragment text.
        text: String,
    },
    /// Final answer metadata and citations.
    Meta(ChatMeta),
    /// No further events will arrive.
    Done,
    /// The stream failed, or one event's payload could not be decoded.
    Error(StreamFailure),
}

impl StreamEvent {
    /// Event name as it appears on the wire, used in log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::Meta(_) => "meta",
            Self::Done => "done",
            Self::Error(_) => "error",
        }
    }

    /// Whether this event ends the stream.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        match self {
            Self::Done => true,
            Self::Error(failure) => failure.is_fatal(),
            Self::Token { .. } | Self::Meta(_) => false,
        }
    }
}

/// Why a [`StreamEvent::Error`] was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFailure {
    /// The connection errored while reading.
    Transport(String),
    /// The server closed the stream before sending `done`.
    ClosedEarly,
    /// A single event's payload was not valid JSON for its type.
    ///
    /// Only that event is lost; the stream continues.
    MalformedPayload {
        /// Wire event name (`token` or `meta`).
        event: String,
        /// Decoder message.
        detail: String,
    },
}

impl StreamFailure {
    /// Whether the failure ends the stream.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::MalformedPayload { .. })
    }
}

impl fmt::Display for StreamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "stream connection failed: {message}"),
            Self::ClosedEarly => f.write_str("stream closed before the answer finished"),
            Self::MalformedPayload { event, detail } => {
                write!(f, "malformed `{event}` event: {detail}")
            }
        }
    }
}
