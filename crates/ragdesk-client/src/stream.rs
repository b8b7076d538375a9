//! Chat event streams and their connection handles.
//!
//! Opening a chat stream spawns a reader task that decodes the response body
//! and forwards [`StreamEvent`]s over a channel. The [`ConnectionHandle`] owns
//! that task; closing the handle aborts it and with it the HTTP connection.
//!
//! ```text
//!   body chunks ──► eventsource() ──► decode_event ──► mpsc ──► ChatStream::next_event
//!                       (reader task, owned by ConnectionHandle)
//! ```

use std::fmt;
use std::fmt::Display;

use bytes::Bytes;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::{Stream, StreamExt};
use ragdesk_core::{StreamEvent, StreamFailure};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::sse::decode_event;

/// Buffered events between the reader task and the consumer.
const EVENT_BUFFER: usize = 64;

/// Exclusive ownership of one open stream connection.
///
/// [`close`](Self::close) runs the release action at most once; later calls
/// are no-ops. Dropping an open handle closes it.
pub struct ConnectionHandle {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ConnectionHandle {
    /// Wrap an arbitrary release action.
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A handle that owns a reader task; releasing it aborts the task.
    #[must_use]
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self::new(move || task.abort())
    }

    /// A handle with nothing to release.
    #[must_use]
    pub fn detached() -> Self {
        Self { release: None }
    }

    /// Release the connection.
    ///
    /// Returns `true` only for the call that actually released it.
    pub fn close(&mut self) -> bool {
        match self.release.take() {
            Some(release) => {
                release();
                true
            }
            None => false,
        }
    }

    /// Whether the connection has not been released yet.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.release.is_some()
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if self.close() {
            debug!("Connection released on drop");
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("open", &self.is_open())
            .finish()
    }
}

/// An open chat stream: ordered events plus the connection that produces them.
#[derive(Debug)]
pub struct ChatStream {
    events: mpsc::Receiver<StreamEvent>,
    handle: ConnectionHandle,
}

impl ChatStream {
    /// Assemble a stream from an event receiver and its connection handle.
    #[must_use]
    pub fn from_parts(events: mpsc::Receiver<StreamEvent>, handle: ConnectionHandle) -> Self {
        Self { events, handle }
    }

    /// Decode an event-stream body on a background task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<S, E>(body: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let task = tokio::spawn(read_body(body, tx));
        Self::from_parts(rx, ConnectionHandle::from_task(task))
    }

    /// Next event in arrival order, or `None` once the reader has stopped.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Release the underlying connection. Idempotent.
    pub fn close(&mut self) -> bool {
        self.handle.close()
    }

    /// Whether the connection is still held.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.handle.is_open()
    }

    /// Split into the event receiver and the connection handle.
    #[must_use]
    pub fn into_parts(self) -> (mpsc::Receiver<StreamEvent>, ConnectionHandle) {
        (self.events, self.handle)
    }
}

/// Reader task: decode the body and forward events until a terminal one.
///
/// A body that ends without `done` yields [`StreamFailure::ClosedEarly`].
async fn read_body<S, E>(body: S, tx: mpsc::Sender<StreamEvent>)
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let events = body.eventsource();
    tokio::pin!(events);

    while let Some(next) = events.next().await {
        let event = match next {
            Ok(parsed) => {
                trace!(event = %parsed.event, len = parsed.data.len(), "Stream event");
                match decode_event(&parsed) {
                    Some(event) => event,
                    None => continue,
                }
            }
            Err(e) => {
                let message = match e {
                    EventStreamError::Transport(inner) => inner.to_string(),
                    other => other.to_string(),
                };
                debug!(error = %message, "Stream read failed");
                StreamEvent::Error(StreamFailure::Transport(message))
            }
        };

        let terminal = event.is_terminal();
        if tx.send(event).await.is_err() || terminal {
            return;
        }
    }

    debug!("Stream ended without done");
    let _ = tx.send(StreamEvent::Error(StreamFailure::ClosedEarly)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn body(chunks: &[&'static str]) -> impl Stream<Item = Result<Bytes, String>> + Send {
        let items: Vec<Result<Bytes, String>> =
            chunks.iter().map(|c| Ok(Bytes::from_static(c.as_bytes()))).collect();
        futures::stream::iter(items)
    }

    async fn collect(mut stream: ChatStream) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = stream.next_event().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn close_releases_exactly_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let mut handle = ConnectionHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(handle.is_open());
        assert!(handle.close());
        assert!(!handle.close());
        drop(handle);

        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases_open_handle() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        drop(ConnectionHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(!ConnectionHandle::detached().is_open());
    }

    #[tokio::test]
    async fn stops_after_done() {
        let stream = ChatStream::spawn(body(&[
            "event: token\ndata: {\"text\":\"A\"}\n\n",
            "event: done\ndata: {}\n\nevent: token\ndata: {\"text\":\"late\"}\n\n",
        ]));

        let events = collect(stream).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Token {
                    text: "A".to_string()
                },
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn body_ending_without_done_is_closed_early() {
        let stream = ChatStream::spawn(body(&["event: token\ndata: {\"text\":\"A\"}\n\n"]));

        let events = collect(stream).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], StreamEvent::Error(StreamFailure::ClosedEarly));
    }

    #[tokio::test]
    async fn read_error_is_transport_failure() {
        let items: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(b"event: token\ndata: {\"text\":\"A\"}\n\n")),
            Err("connection reset".to_string()),
        ];
        let stream = ChatStream::spawn(futures::stream::iter(items));

        let events = collect(stream).await;
        assert_eq!(
            events.last(),
            Some(&StreamEvent::Error(StreamFailure::Transport(
                "connection reset".to_string()
            )))
        );
    }

    #[tokio::test]
    async fn malformed_event_does_not_end_stream() {
        let stream = ChatStream::spawn(body(&[
            "event: token\ndata: oops\n\n",
            "event: token\ndata: {\"text\":\"B\"}\n\nevent: done\ndata: {}\n\n",
        ]));

        let events = collect(stream).await;
        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[0],
            StreamEvent::Error(StreamFailure::MalformedPayload { .. })
        ));
        assert_eq!(events[2], StreamEvent::Done);
    }

    fn token(text: &str) -> StreamEvent {
        StreamEvent::Token {
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn handles_crlf_line_endings() {
        let stream = ChatStream::spawn(body(&[
            "event: token\r\ndata: {\"text\":\"a\"}\r\n\r\nevent: done\r\ndata: {}\r\n\r\n",
        ]));

        assert_eq!(collect(stream).await, vec![token("a"), StreamEvent::Done]);
    }

    #[tokio::test]
    async fn reassembles_events_split_across_chunks() {
        let stream = ChatStream::spawn(body(&[
            "eve",
            "nt: tok",
            "en\nda",
            "ta: {\"text\":\"x\"}\n",
            "\nevent: done\ndata: {}\n\n",
        ]));

        assert_eq!(collect(stream).await, vec![token("x"), StreamEvent::Done]);
    }

    #[tokio::test]
    async fn keeps_multibyte_characters_split_across_chunks() {
        let text = "caf\u{e9} \u{1f600}";
        let frame = format!("event: token\ndata: {{\"text\":\"{text}\"}}\n\nevent: done\ndata: {{}}\n\n");
        let bytes = frame.into_bytes();
        // Cut inside the four-byte emoji.
        let split = bytes.windows(4).position(|w| w == "\u{1f600}".as_bytes()).unwrap() + 2;
        let items: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::copy_from_slice(&bytes[..split])),
            Ok(Bytes::copy_from_slice(&bytes[split..])),
        ];

        let events = collect(ChatStream::spawn(futures::stream::iter(items))).await;
        assert_eq!(events, vec![token(text), StreamEvent::Done]);
    }

    #[tokio::test]
    async fn joins_multiline_data_and_skips_comments() {
        let stream = ChatStream::spawn(body(&[
            ": keep-alive\n\n",
            "event: token\ndata: {\"text\":\ndata: \"joined\"}\n\n",
            "data: default message\n\n",
            "event: done\ndata: {}\n\n",
        ]));

        assert_eq!(collect(stream).await, vec![token("joined"), StreamEvent::Done]);
    }

    #[tokio::test]
    async fn close_stops_a_pending_stream() {
        let mut stream = ChatStream::spawn(futures::stream::pending::<Result<Bytes, String>>());
        assert!(stream.close());
        assert!(!stream.close());
        assert_eq!(stream.next_event().await, None);
    }
}
