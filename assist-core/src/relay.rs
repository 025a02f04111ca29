//! Bridges chat requests to the agent backend.
//!
//! Every call runs the agent inside its own spawned task. The one-shot path
//! awaits that task and concatenates the fragments; the streaming path hands
//! back the receiving end of a channel the task feeds with [`StreamEvent`]s.
//! Agent failures never escape either path: they degrade to a fixed reply
//! or an `error` event.

use futures::{FutureExt, StreamExt};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

use crate::agent::{AgentBackend, AgentRequest};
use crate::error::AgentError;
use crate::event::StreamEvent;
use crate::session::SessionRegistry;

/// Returned by the one-shot path when the agent fails
pub const FALLBACK_REPLY: &str = "I'm experiencing technical difficulties. Please try again later.";

/// Content of the `error` event sent when the agent fails mid-stream
pub const STREAM_ERROR_MESSAGE: &str = "I encountered an error. Please try again.";

const STREAM_BUFFER: usize = 32;

pub type RelayStream = ReceiverStream<StreamEvent>;

/// A complete one-shot answer
#[derive(Debug, Clone)]
pub struct Reply {
    pub content: String,
    pub session_id: String,
}

pub struct Relay {
    agent: Arc<dyn AgentBackend>,
    sessions: Arc<SessionRegistry>,
    database_uri: Option<String>,
}

impl Relay {
    pub fn new(
        agent: Arc<dyn AgentBackend>,
        sessions: Arc<SessionRegistry>,
        database_uri: Option<String>,
    ) -> Self {
        Self {
            agent,
            sessions,
            database_uri,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn agent(&self) -> &Arc<dyn AgentBackend> {
        &self.agent
    }

    /// Ask the agent and wait for the whole answer.
    /// Always yields a reply and a valid session id.
    pub async fn respond(
        &self,
        message: &str,
        session_id: Option<&str>,
        username: Option<&str>,
    ) -> Reply {
        let request = self.prepare(message, session_id, username).await;
        let session_id = request.session_id.clone();

        let task = tokio::spawn(collect_response(self.agent.clone(), request));
        let content = match task.await {
            Ok(Ok(content)) => content,
            Ok(Err(e)) => {
                error!("[{}] Error generating response: {}", session_id, e);
                FALLBACK_REPLY.to_string()
            }
            Err(e) => {
                error!("[{}] Response task failed: {}", session_id, e);
                FALLBACK_REPLY.to_string()
            }
        };

        Reply {
            content,
            session_id,
        }
    }

    /// Ask the agent and stream its answer as events.
    /// The first event always announces the session in effect.
    pub async fn stream(
        &self,
        message: &str,
        session_id: Option<&str>,
        username: Option<&str>,
    ) -> RelayStream {
        let request = self.prepare(message, session_id, username).await;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        tokio::spawn(relay_fragments(self.agent.clone(), request, tx));

        ReceiverStream::new(rx)
    }

    /// Resolve the session and the acting user into an agent request
    async fn prepare(
        &self,
        message: &str,
        session_id: Option<&str>,
        username: Option<&str>,
    ) -> AgentRequest {
        let session = self.sessions.resolve(session_id, username).await;
        let username = username
            .filter(|u| !u.trim().is_empty())
            .map(str::to_string)
            .unwrap_or(session.username);

        AgentRequest {
            session_id: session.session_id,
            message: message.to_string(),
            database_uri: self.database_uri.clone(),
            username,
        }
    }
}

async fn collect_response(
    agent: Arc<dyn AgentBackend>,
    request: AgentRequest,
) -> Result<String, AgentError> {
    let mut fragments = agent.stream_response(request).await?;
    let mut response = String::new();
    while let Some(fragment) = fragments.next().await {
        response.push_str(&fragment?);
    }
    Ok(response)
}

enum PumpOutcome {
    Completed,
    Disconnected,
}

async fn pump_fragments(
    agent: &dyn AgentBackend,
    request: AgentRequest,
    tx: &mpsc::Sender<StreamEvent>,
) -> Result<PumpOutcome, AgentError> {
    let mut fragments = agent.stream_response(request).await?;
    while let Some(fragment) = fragments.next().await {
        let content = fragment?;
        // Blank fragments never become chunk events
        if content.trim().is_empty() {
            continue;
        }
        if tx.send(StreamEvent::Chunk { content }).await.is_err() {
            return Ok(PumpOutcome::Disconnected);
        }
    }
    Ok(PumpOutcome::Completed)
}

async fn relay_fragments(
    agent: Arc<dyn AgentBackend>,
    request: AgentRequest,
    tx: mpsc::Sender<StreamEvent>,
) {
    let session_id = request.session_id.clone();

    let announce = StreamEvent::Session {
        session_id: session_id.clone(),
    };
    if tx.send(announce).await.is_err() {
        debug!("[{}] Client gone before streaming started", session_id);
        return;
    }

    let outcome = AssertUnwindSafe(pump_fragments(agent.as_ref(), request, &tx))
        .catch_unwind()
        .await;

    let failure = match outcome {
        Ok(Ok(PumpOutcome::Completed)) => {
            let _ = tx.send(StreamEvent::Done).await;
            return;
        }
        Ok(Ok(PumpOutcome::Disconnected)) => {
            // Dropping the fragment stream here stops pulling from the agent
            debug!("[{}] Client disconnected, dropping agent stream", session_id);
            return;
        }
        Ok(Err(e)) => e.to_string(),
        Err(_) => "agent panicked".to_string(),
    };

    error!("[{}] Streaming chat error: {}", session_id, failure);
    let _ = tx
        .send(StreamEvent::Error {
            content: STREAM_ERROR_MESSAGE.to_string(),
        })
        .await;
}
