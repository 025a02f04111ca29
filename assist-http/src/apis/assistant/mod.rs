pub mod handler;
pub mod types;

pub use handler::{handle_chat, handle_chat_stream, handle_clear_session, handle_new_session};
pub use types::{ChatRequest, ChatResponse, ClearSessionRequest, MessageResponse, NewSessionResponse};
