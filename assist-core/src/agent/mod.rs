//! Agent backends: the external collaborator that actually produces answers.
//!
//! The relay only needs two things from an agent: a stream of text fragments
//! for a message, and a one-off storage setup hook run at startup.

mod echo;
mod remote;
mod sse;

pub use echo::EchoAgent;
pub use remote::RemoteAgent;
pub use sse::SseDecoder;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::AgentError;

/// Incremental agent output. Fragments may be empty; the stream may end
/// without yielding anything or fail part way through.
pub type FragmentStream = BoxStream<'static, Result<String, AgentError>>;

/// Everything the agent needs to answer one message
#[derive(Debug, Clone, Serialize)]
pub struct AgentRequest {
    pub session_id: String,
    pub message: String,
    pub database_uri: Option<String>,
    pub username: String,
}

#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Start answering `request`, returning the fragment stream
    async fn stream_response(&self, request: AgentRequest) -> Result<FragmentStream, AgentError>;

    /// Prepare the agent's persistent storage
    async fn setup(&self, database_uri: Option<&str>) -> Result<(), AgentError>;

    fn name(&self) -> &str;
}

/// Run the agent's storage setup in the background.
/// The outcome is only logged; request handling never waits on it.
pub fn spawn_storage_setup(
    agent: Arc<dyn AgentBackend>,
    database_uri: Option<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match agent.setup(database_uri.as_deref()).await {
            Ok(()) => info!("✓ Agent storage initialized ({})", agent.name()),
            Err(e) => error!("Failed to set up agent storage ({}): {}", agent.name(), e),
        }
    })
}
