//! Server-sent event framing for streamed replies

use super::ApiError;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::{Stream, StreamExt};
use std::fmt::Display;

/// The `data:` payload of every event in a raw SSE body.
///
/// Comments, `event:` and `id:` fields are consumed by the parser. Transport
/// failures keep their own classification; malformed framing is a decode error.
pub(crate) fn data_payloads<S, B, E>(bytes: S) -> impl Stream<Item = Result<String, ApiError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ApiError> + Display,
{
    bytes.eventsource().map(|event| match event {
        Ok(event) => Ok(event.data),
        Err(EventStreamError::Transport(e)) => Err(e.into()),
        Err(e) => Err(ApiError::decode(format!("Malformed event stream: {e}"))),
    })
}
