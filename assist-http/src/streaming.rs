use assist_core::{RelayStream, StreamEvent};
use axum::{
    body::{Body, Bytes},
    http::header,
    response::{IntoResponse, Response},
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use tracing::{debug, error};

/// Frame relay events as `data: {json}\n\n` chunks.
/// Stops after the first terminal event (`done` or `error`) or when the
/// relay closes the channel.
pub fn event_to_frame_stream(
    events: RelayStream,
    request_id: String,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    futures::stream::unfold((events, false), move |state| {
        let request_id = request_id.clone();
        async move {
            let (mut events, done) = state;

            if done {
                return None;
            }

            loop {
                let event = events.next().await?;
                let is_terminal = event.is_terminal();

                match event.to_frame() {
                    Ok(frame) => {
                        if let StreamEvent::Session { session_id } = &event {
                            debug!("[{}] - [{}] Streaming started", request_id, session_id);
                        }
                        return Some((Ok(Bytes::from(frame)), (events, is_terminal)));
                    }
                    Err(e) => {
                        error!("[{}] Failed to serialize event: {}", request_id, e);
                        if is_terminal {
                            return None;
                        }
                        continue;
                    }
                }
            }
        }
    })
}

/// Build the streaming chat response.
///
/// The body is declared `text/plain` but carries SSE-style frames; clients
/// read it line by line and parse `data:` lines as JSON.
pub fn frame_stream_response(events: RelayStream, request_id: String) -> Response {
    let body = Body::from_stream(event_to_frame_stream(events, request_id));
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        body,
    )
        .into_response()
}
