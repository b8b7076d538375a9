//! Session controller: at most one streaming answer at a time.
//!
//! The controller owns the active [`StreamingSession`]. Each opened stream gets
//! a pump task that tags its events with the session id and forwards them to
//! the channel handed to [`SessionController::new`]. The owner of the receiving
//! end feeds them back through [`SessionController::apply_event`], where events
//! for any session other than the active one are dropped.
//!
//! ```text
//!   ask ──► cancel previous ──► open stream ──► pump(session_id) ──► mpsc
//!                                                                     │
//!   snapshot ◄── StreamingSession ◄── apply_event(SessionEvent) ◄─────┘
//! ```

use ragdesk_client::ConnectionHandle;
use ragdesk_core::{ChatMeta, SessionId, StreamEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::error::{Result, SessionError};
use crate::session::StreamingSession;
use crate::state::{self, SessionState};
use crate::transport::ChatTransport;

/// Buffer size for [`SessionController::channel`].
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A stream event tagged with the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    /// Session the event belongs to.
    pub session_id: SessionId,
    /// The decoded event.
    pub event: StreamEvent,
}

/// Immutable picture of the active session for views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    /// Active session id; `None` before the first question.
    pub session_id: Option<SessionId>,
    /// The question being answered.
    pub question: String,
    /// Lifecycle state.
    pub state: SessionState,
    /// Answer text received so far.
    pub answer: String,
    /// Answer metadata, if received.
    pub meta: Option<ChatMeta>,
    /// Failure message when `state` is `Failed`.
    pub error: Option<String>,
}

impl SessionView {
    /// Whether a question is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        state::is_active(self.state)
    }
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            session_id: None,
            question: String::new(),
            state: SessionState::Idle,
            answer: String::new(),
            meta: None,
            error: None,
        }
    }
}

/// Owns the active streaming session.
pub struct SessionController<T> {
    transport: T,
    events: mpsc::Sender<SessionEvent>,
    active: Option<StreamingSession>,
}

impl<T: ChatTransport> SessionController<T> {
    /// Create a controller that forwards session events to `events`.
    pub fn new(transport: T, events: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            transport,
            events,
            active: None,
        }
    }

    /// Create a controller together with its event receiver.
    pub fn channel(transport: T) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (Self::new(transport, tx), rx)
    }

    /// The transport used to open streams.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Ask a question, superseding any session still in flight.
    ///
    /// The previous session is cancelled and its connection released before
    /// the new one is created. A stream that cannot be opened leaves the new
    /// session `Failed`; that is recorded on the session, not returned.
    ///
    /// Cancel-safe: the new session becomes active only once the open has
    /// resolved, so dropping this future mid-open leaves nothing in flight.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyQuestion` for a blank question. The
    /// current session is left untouched in that case.
    pub async fn ask(&mut self, question: &str, top_k: u32) -> Result<SessionId> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SessionError::EmptyQuestion);
        }

        self.cancel();

        let mut session = StreamingSession::open(question, top_k);
        let session_id = session.id();
        info!(session_id = %session_id, top_k, "Asking question");

        match self.transport.open_chat_stream(question, top_k).await {
            Ok(stream) => {
                let (mut events, mut connection) = stream.into_parts();
                let tx = self.events.clone();
                let pump = tokio::spawn(async move {
                    while let Some(event) = events.recv().await {
                        if tx.send(SessionEvent { session_id, event }).await.is_err() {
                            break;
                        }
                    }
                    trace!(session_id = %session_id, "Pump finished");
                });
                session.attach(ConnectionHandle::new(move || {
                    connection.close();
                    pump.abort();
                }));
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to open answer stream");
                session.fail(SessionError::StreamOpen(e));
            }
        }

        self.active = Some(session);
        Ok(session_id)
    }

    /// Fold one tagged event into the active session.
    ///
    /// Returns `true` if the view should redraw. Events for any other
    /// session are discarded without effect.
    pub fn apply_event(&mut self, event: SessionEvent) -> bool {
        match self.active.as_mut() {
            Some(session) if session.id() == event.session_id => {
                session.apply(event.event).changed()
            }
            _ => {
                trace!(
                    session_id = %event.session_id,
                    event = event.event.kind(),
                    "Stale event discarded"
                );
                false
            }
        }
    }

    /// Cancel the active session if it is still in flight.
    ///
    /// Returns `true` if a session was cancelled. Safe to call repeatedly.
    pub fn cancel(&mut self) -> bool {
        let cancelled = self.active.as_mut().is_some_and(StreamingSession::cancel);
        if cancelled {
            debug!("Active session cancelled");
        }
        cancelled
    }

    /// Cancel anything in flight before the consumer goes away.
    pub fn teardown(&mut self) {
        if self.cancel() {
            info!("Session torn down");
        }
    }

    /// The active session, if any.
    #[must_use]
    pub fn active(&self) -> Option<&StreamingSession> {
        self.active.as_ref()
    }

    /// Id of the active session, if any.
    #[must_use]
    pub fn active_id(&self) -> Option<SessionId> {
        self.active.as_ref().map(StreamingSession::id)
    }

    /// Whether a question is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|s| state::is_active(s.state()))
    }

    /// Snapshot of the active session for rendering.
    #[must_use]
    pub fn snapshot(&self) -> SessionView {
        self.active
            .as_ref()
            .map_or_else(SessionView::default, |session| SessionView {
                session_id: Some(session.id()),
                question: session.question().to_string(),
                state: session.state(),
                answer: session.answer().to_string(),
                meta: session.meta().cloned(),
                error: session.failure().map(ToString::to_string),
            })
    }
}

impl<T> Drop for SessionController<T> {
    fn drop(&mut self) {
        if let Some(session) = self.active.as_mut() {
            if session.cancel() {
                debug!(session_id = %session.id(), "Session cancelled on drop");
            }
        }
    }
}
