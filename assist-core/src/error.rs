use thiserror::Error;

/// Failures raised by an agent backend
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Agent request failed: {0}")]
    Request(String),
    #[error("Agent returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Agent stream error: {0}")]
    Stream(String),
    #[error("Storage setup failed: {0}")]
    Setup(String),
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::Request(err.to_string())
    }
}

/// Errors surfaced by the assistant, tagged by origin so the HTTP layer
/// can map them to status codes and logs can tell them apart
#[derive(Error, Debug)]
pub enum AssistError {
    #[error("{0}")]
    Validation(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AssistError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AssistError::Validation(msg.into())
    }

    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        AssistError::SessionNotFound {
            session_id: session_id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AssistError>;
