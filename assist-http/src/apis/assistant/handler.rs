use assist_core::AssistError;
use axum::{
    extract::{Extension, State},
    response::{Json, Response},
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::types::{
    ChatRequest, ChatResponse, ClearSessionRequest, MessageResponse, NewSessionResponse,
};
use crate::auth::Caller;
use crate::streaming::frame_stream_response;
use crate::{ApiJson, ErrorResponse, ServerState};

/// Trimmed message text, or a validation error if nothing is left
fn require_message(payload: &ChatRequest) -> Result<&str, AssistError> {
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(AssistError::validation("Message is required"));
    }
    Ok(message)
}

/// POST /api/new_session - Start a fresh session for the caller
pub async fn handle_new_session(
    State(state): State<ServerState>,
    Extension(caller): Extension<Caller>,
) -> Json<NewSessionResponse> {
    let request_id = Uuid::new_v4();
    info!("[{}] POST /api/new_session user={}", request_id, caller.username);

    let session_id = state.relay.sessions().create_session(Some(&caller.username)).await;

    Json(NewSessionResponse {
        session_id,
        status: "created".to_string(),
        message: "New session initialized".to_string(),
    })
}

/// POST /api/chat - Ask the agent and return the complete answer
pub async fn handle_chat(
    State(state): State<ServerState>,
    Extension(caller): Extension<Caller>,
    ApiJson(payload): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ErrorResponse> {
    let request_id = Uuid::new_v4();
    info!(
        "[{}] POST /api/chat user={} session={}",
        request_id,
        caller.username,
        payload.session_id.as_deref().unwrap_or("-")
    );

    let message = require_message(&payload)?;
    let reply = state
        .relay
        .respond(message, payload.session_id.as_deref(), Some(&caller.username))
        .await;

    Ok(Json(ChatResponse {
        response: reply.content,
        session_id: reply.session_id,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

/// POST /api/chat_stream - Ask the agent and stream the answer as frames
/// Once the stream has started, failures arrive as an in-stream `error` event
pub async fn handle_chat_stream(
    State(state): State<ServerState>,
    Extension(caller): Extension<Caller>,
    ApiJson(payload): ApiJson<ChatRequest>,
) -> Result<Response, ErrorResponse> {
    let request_id = Uuid::new_v4();
    info!(
        "[{}] POST /api/chat_stream user={} session={}",
        request_id,
        caller.username,
        payload.session_id.as_deref().unwrap_or("-")
    );

    let message = require_message(&payload)?;
    let events = state
        .relay
        .stream(message, payload.session_id.as_deref(), Some(&caller.username))
        .await;

    Ok(frame_stream_response(events, request_id.to_string()))
}

/// POST /api/clear_session - Forget a session
pub async fn handle_clear_session(
    State(state): State<ServerState>,
    Extension(caller): Extension<Caller>,
    ApiJson(payload): ApiJson<ClearSessionRequest>,
) -> Result<Json<MessageResponse>, ErrorResponse> {
    let request_id = Uuid::new_v4();
    let session_id = payload.session_id.unwrap_or_default();
    info!("[{}] POST /api/clear_session user={} session={}", request_id, caller.username, session_id);

    state.relay.sessions().clear_session(&session_id).await?;

    Ok(Json(MessageResponse {
        message: "Session cleared successfully".to_string(),
    }))
}
