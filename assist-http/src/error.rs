use assist_core::AssistError;
use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use tracing::error;

/// Error response structure for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: String, error_type: String, code: Option<String>) -> Self {
        Self {
            error: ErrorDetail {
                message,
                r#type: error_type,
                code,
            },
        }
    }

    pub fn not_found(message: String) -> Self {
        Self::new(message, "not_found".to_string(), Some("session_not_found".to_string()))
    }

    pub fn invalid_request(message: String) -> Self {
        Self::new(message, "invalid_request".to_string(), None)
    }

    pub fn unauthorized(message: String) -> Self {
        Self::new(message, "unauthorized".to_string(), None)
    }

    pub fn internal_error(message: String) -> Self {
        Self::new(message, "internal_error".to_string(), None)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.r#type.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "invalid_request" => StatusCode::BAD_REQUEST,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<AssistError> for ErrorResponse {
    fn from(err: AssistError) -> Self {
        match err {
            AssistError::Validation(message) => ErrorResponse::invalid_request(message),
            AssistError::Unauthorized => ErrorResponse::unauthorized(err.to_string()),
            AssistError::SessionNotFound { .. } => {
                ErrorResponse::not_found("Session not found".to_string())
            }
            AssistError::Agent(e) => {
                error!("Agent error: {}", e);
                ErrorResponse::internal_error("Failed to process message".to_string())
            }
            AssistError::Internal(e) => {
                error!("Assistant error: {:#}", e);
                ErrorResponse::internal_error("Something went wrong".to_string())
            }
        }
    }
}

/// Custom JSON extractor that returns our ErrorResponse on deserialization failures
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ErrorResponse))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ErrorResponse {
    fn from(rejection: JsonRejection) -> Self {
        let message = rejection.body_text();
        error!("JSON deserialization error: {}", message);
        ErrorResponse::invalid_request(message)
    }
}

/// Last-resort boundary: a panicking handler becomes a generic 500
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {}", detail);
    ErrorResponse::internal_error("Something went wrong".to_string()).into_response()
}
