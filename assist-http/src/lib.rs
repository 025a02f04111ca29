pub mod apis;
pub mod auth;
pub mod error;
pub mod http;
pub mod streaming;

pub use auth::Caller;
pub use error::{ApiJson, ErrorResponse};
pub use http::{router, start_server, ServerConfig, ServerState};
pub use streaming::{event_to_frame_stream, frame_stream_response};

#[cfg(test)]
mod tests;
