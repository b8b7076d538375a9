//! One question's streaming lifecycle.
//!
//! A [`StreamingSession`] folds decoded stream events into answer text,
//! metadata and a failure cause. It owns the connection handle for its stream
//! and releases it on the first terminal transition. Folding is synchronous;
//! the controller decides which session an event belongs to.

use ragdesk_client::ConnectionHandle;
use ragdesk_core::{ChatMeta, SessionId, StreamEvent};
use tracing::{debug, trace, warn};

use crate::error::SessionError;
use crate::state::{self, SessionState};

/// What applying one event did to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Answer text or metadata changed.
    Updated,
    /// The session reached a terminal state.
    Finished(SessionState),
    /// Nothing changed.
    Ignored,
}

impl Applied {
    /// Whether the view needs to redraw.
    #[must_use]
    pub const fn changed(self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

/// A single streaming question.
#[derive(Debug)]
pub struct StreamingSession {
    id: SessionId,
    question: String,
    top_k: u32,
    state: SessionState,
    answer: String,
    meta: Option<ChatMeta>,
    failure: Option<SessionError>,
    connection: ConnectionHandle,
}

impl StreamingSession {
    /// Create a session in `Open` with a fresh id and no connection yet.
    #[must_use]
    pub fn open(question: impl Into<String>, top_k: u32) -> Self {
        let id = SessionId::generate();
        debug!(session_id = %id, "Session opened");
        Self {
            id,
            question: question.into(),
            top_k,
            state: SessionState::Open,
            answer: String::new(),
            meta: None,
            failure: None,
            connection: ConnectionHandle::detached(),
        }
    }

    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The submitted question.
    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Retrieval depth the question was asked with.
    #[must_use]
    pub fn top_k(&self) -> u32 {
        self.top_k
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Answer accumulated so far.
    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Metadata, once a `meta` event has been applied.
    #[must_use]
    pub fn meta(&self) -> Option<&ChatMeta> {
        self.meta.as_ref()
    }

    /// Why the session failed, if it did.
    #[must_use]
    pub fn failure(&self) -> Option<&SessionError> {
        self.failure.as_ref()
    }

    /// Whether the session has reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        state::is_terminal(self.state)
    }

    /// Whether the session still holds its connection.
    #[must_use]
    pub fn holds_connection(&self) -> bool {
        self.connection.is_open()
    }

    /// Hand the session ownership of its stream connection.
    ///
    /// A session that already finished releases the handle immediately.
    pub fn attach(&mut self, connection: ConnectionHandle) {
        self.connection = connection;
        if self.is_terminal() {
            self.release();
        }
    }

    /// Fold one event into the session.
    pub fn apply(&mut self, event: StreamEvent) -> Applied {
        if self.is_terminal() {
            trace!(session_id = %self.id, event = event.kind(), "Event after terminal state discarded");
            return Applied::Ignored;
        }

        match event {
            StreamEvent::Token { text } => {
                self.advance(SessionState::Streaming);
                self.answer.push_str(&text);
                Applied::Updated
            }
            StreamEvent::Meta(meta) => {
                if self.meta.is_some() {
                    warn!(session_id = %self.id, "Duplicate meta event");
                    return self.finish(SessionState::Failed, Some(SessionError::DuplicateMeta));
                }
                self.advance(SessionState::Streaming);
                self.meta = Some(meta);
                Applied::Updated
            }
            StreamEvent::Done => self.finish(SessionState::Completed, None),
            StreamEvent::Error(failure) if !failure.is_fatal() => {
                warn!(session_id = %self.id, error = %failure, "Dropping malformed stream event");
                Applied::Ignored
            }
            StreamEvent::Error(failure) => self.finish(
                SessionState::Failed,
                Some(SessionError::Stream(failure.to_string())),
            ),
        }
    }

    /// Mark the session failed with the given cause.
    pub fn fail(&mut self, error: SessionError) -> Applied {
        if self.is_terminal() {
            return Applied::Ignored;
        }
        self.finish(SessionState::Failed, Some(error))
    }

    /// Cancel the session. Returns `false` if it was already terminal.
    pub fn cancel(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.finish(SessionState::Cancelled, None);
        true
    }

    fn advance(&mut self, to: SessionState) {
        match state::validate_transition(self.state, to) {
            Ok(next) => self.state = next,
            Err(e) => warn!(session_id = %self.id, error = %e, "Ignoring transition"),
        }
    }

    fn finish(&mut self, to: SessionState, failure: Option<SessionError>) -> Applied {
        self.advance(to);
        if failure.is_some() {
            self.failure = failure;
        }
        self.release();
        debug!(
            session_id = %self.id,
            state = %self.state,
            answer_len = self.answer.len(),
            "Session finished"
        );
        Applied::Finished(self.state)
    }

    fn release(&mut self) {
        if self.connection.close() {
            debug!(session_id = %self.id, "Connection released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragdesk_core::{Citation, StreamFailure};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn token(text: &str) -> StreamEvent {
        StreamEvent::Token {
            text: text.to_string(),
        }
    }

    fn meta(latency_ms: u64) -> ChatMeta {
        ChatMeta {
            provider: "openai".to_string(),
            model: "gpt".to_string(),
            latency_ms,
            citations: vec![Citation {
                filename: "faiss.txt".to_string(),
                document_id: "d1".parse().unwrap(),
                chunk_id: 1,
                chunk_index: 0,
                start_char: Some(0),
                end_char: Some(12),
                snippet: "FAISS is".to_string(),
            }],
        }
    }

    fn counted_handle(releases: &Arc<AtomicUsize>) -> ConnectionHandle {
        let releases = Arc::clone(releases);
        ConnectionHandle::new(move || {
            releases.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn tokens_append_in_arrival_order() {
        let mut session = StreamingSession::open("q", 5);
        let fragments = ["FA", "ISS", " is", " a library."];
        let mut expected = String::new();

        for fragment in fragments {
            assert_eq!(session.apply(token(fragment)), Applied::Updated);
            expected.push_str(fragment);
            assert_eq!(session.answer(), expected);
        }
        assert_eq!(session.state(), SessionState::Streaming);
    }

    #[test]
    fn meta_before_tokens_is_valid() {
        let mut session = StreamingSession::open("q", 5);
        session.apply(StreamEvent::Meta(meta(10)));
        session.apply(token("late answer"));
        session.apply(StreamEvent::Done);

        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(session.meta().map(|m| m.latency_ms), Some(10));
        assert_eq!(session.answer(), "late answer");
    }

    #[test]
    fn done_without_meta_completes() {
        let mut session = StreamingSession::open("q", 5);
        session.apply(token("x"));
        assert_eq!(
            session.apply(StreamEvent::Done),
            Applied::Finished(SessionState::Completed)
        );
        assert!(session.meta().is_none());
        assert!(session.failure().is_none());
    }

    #[test]
    fn second_meta_fails_and_keeps_first() {
        let releases = Arc::new(AtomicUsize::new(0));
        let mut session = StreamingSession::open("q", 5);
        session.attach(counted_handle(&releases));

        session.apply(StreamEvent::Meta(meta(420)));
        let applied = session.apply(StreamEvent::Meta(meta(999)));

        assert_eq!(applied, Applied::Finished(SessionState::Failed));
        assert_eq!(session.meta().map(|m| m.latency_ms), Some(420));
        assert!(matches!(session.failure(), Some(SessionError::DuplicateMeta)));
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stream_error_preserves_partial_answer() {
        let mut session = StreamingSession::open("q", 5);
        session.apply(token("A"));
        session.apply(token("B"));
        session.apply(StreamEvent::Error(StreamFailure::Transport("reset".to_string())));

        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.answer(), "AB");
        assert!(matches!(session.failure(), Some(SessionError::Stream(_))));
    }

    #[test]
    fn error_before_data_fails_from_open() {
        let mut session = StreamingSession::open("q", 5);
        session.apply(StreamEvent::Error(StreamFailure::ClosedEarly));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.answer(), "");
    }

    #[test]
    fn malformed_payload_is_dropped() {
        let mut session = StreamingSession::open("q", 5);
        session.apply(token("A"));
        let applied = session.apply(StreamEvent::Error(StreamFailure::MalformedPayload {
            event: "token".to_string(),
            detail: "expected value".to_string(),
        }));

        assert_eq!(applied, Applied::Ignored);
        assert_eq!(session.state(), SessionState::Streaming);
        session.apply(token("B"));
        assert_eq!(session.answer(), "AB");
    }

    #[test]
    fn terminal_session_ignores_events() {
        let mut session = StreamingSession::open("q", 5);
        session.apply(token("A"));
        session.apply(StreamEvent::Done);

        assert_eq!(session.apply(token("late")), Applied::Ignored);
        assert_eq!(session.apply(StreamEvent::Meta(meta(1))), Applied::Ignored);
        assert_eq!(session.answer(), "A");
        assert!(session.meta().is_none());
    }

    #[test]
    fn release_happens_once_across_terminal_paths() {
        let releases = Arc::new(AtomicUsize::new(0));
        let mut session = StreamingSession::open("q", 5);
        session.attach(counted_handle(&releases));
        assert!(session.holds_connection());

        assert!(session.cancel());
        assert!(!session.cancel());
        assert_eq!(session.apply(StreamEvent::Done), Applied::Ignored);
        assert_eq!(session.fail(SessionError::Stream("x".to_string())), Applied::Ignored);
        drop(session);

        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn attaching_to_finished_session_releases_immediately() {
        let releases = Arc::new(AtomicUsize::new(0));
        let mut session = StreamingSession::open("q", 5);
        session.cancel();
        session.attach(counted_handle(&releases));

        assert!(!session.holds_connection());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }
}
