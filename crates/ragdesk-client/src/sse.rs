//! Chat event mapping for `text/event-stream` bodies.
//!
//! Framing (line splitting, `data:` joining, comments, CRLF, split UTF-8)
//! is done by [`eventsource_stream`]; this module only maps a parsed
//! [`Event`] onto a [`StreamEvent`].

use eventsource_stream::Event;
use ragdesk_core::{ChatMeta, CoreError, StreamEvent, StreamFailure, TokenPayload};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Map a parsed event onto a chat stream event.
///
/// Returns `None` for event names the chat contract does not define,
/// including the default `message`. A payload that fails to parse becomes a
/// non-fatal [`StreamFailure::MalformedPayload`].
#[must_use]
pub fn decode_event(event: &Event) -> Option<StreamEvent> {
    let decoded = match event.event.as_str() {
        "token" => parse_payload::<TokenPayload>("token", &event.data)
            .map(|payload| StreamEvent::Token { text: payload.text }),
        "meta" => parse_payload::<ChatMeta>("meta", &event.data).map(StreamEvent::Meta),
        "done" => Ok(StreamEvent::Done),
        other => {
            debug!(event = %other, "Ignoring unrecognized stream event");
            return None;
        }
    };
    Some(decoded.unwrap_or_else(|failure| failure))
}

/// Parse a payload, or produce the error event that replaces it.
fn parse_payload<T: DeserializeOwned>(
    kind: &'static str,
    data: &str,
) -> Result<T, StreamEvent> {
    serde_json::from_str(data).map_err(|source| malformed(kind, source))
}

fn malformed(kind: &'static str, source: serde_json::Error) -> StreamEvent {
    let detail = source.to_string();
    let error = CoreError::MalformedPayload { kind, source };
    warn!(event = kind, error = %error, "Dropping malformed stream event");
    StreamEvent::Error(StreamFailure::MalformedPayload {
        event: kind.to_string(),
        detail,
    })
}
