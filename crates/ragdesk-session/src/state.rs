//! Streaming session state machine.
//!
//! # State Machine
//!
//! ```text
//!     ┌────────┐  ask   ┌────────┐  token/meta  ┌───────────┐
//!     │  Idle  │───────▶│  Open  │─────────────▶│ Streaming │──┐ token/meta
//!     └────────┘        └───┬────┘              └─────┬─────┘◄─┘
//!                           │                         │
//!                           └────────────┬────────────┘
//!                                        │ done / fatal error / cancel
//!                                        ▼
//!                     ┌───────────┐ ┌──────────┐ ┌───────────┐
//!                     │ Completed │ │  Failed  │ │ Cancelled │
//!                     └───────────┘ └──────────┘ └───────────┘
//! ```
//!
//! `Completed`, `Failed` and `Cancelled` are terminal.

use std::fmt;

use crate::error::{Result, SessionError};

/// Lifecycle state of one streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No question asked yet.
    Idle,
    /// Stream requested, no data applied yet.
    Open,
    /// At least one token or meta applied.
    Streaming,
    /// `done` received.
    Completed,
    /// The stream could not be opened or failed mid-way.
    Failed,
    /// Superseded by a newer question or torn down.
    Cancelled,
}

impl SessionState {
    /// Short lowercase label for logs and the status bar.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Open => "open",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validates a state transition and returns the target state if valid.
///
/// # Errors
///
/// Returns `SessionError::InvalidTransition` if the transition is not allowed.
pub fn validate_transition(from: SessionState, to: SessionState) -> Result<SessionState> {
    if is_valid_transition(from, to) {
        Ok(to)
    } else {
        Err(SessionError::InvalidTransition { from, to })
    }
}

/// Check if a state transition is valid according to the state machine.
#[must_use]
pub const fn is_valid_transition(from: SessionState, to: SessionState) -> bool {
    use SessionState::{Cancelled, Completed, Failed, Idle, Open, Streaming};

    matches!(
        (from, to),
        (Idle, Open)
            // A done with nothing before it still completes the session
            | (Open | Streaming, Streaming | Completed | Failed | Cancelled)
    )
}

/// Returns true if no further events may change the session.
#[must_use]
pub const fn is_terminal(state: SessionState) -> bool {
    matches!(
        state,
        SessionState::Completed | SessionState::Failed | SessionState::Cancelled
    )
}

/// Returns true while the session holds (or is acquiring) a connection.
#[must_use]
pub const fn is_active(state: SessionState) -> bool {
    matches!(state, SessionState::Open | SessionState::Streaming)
}
