use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{AgentBackend, AgentRequest, FragmentStream, SseDecoder};
use crate::config::AgentSettings;
use crate::error::AgentError;

const DONE_MARKER: &str = "[DONE]";

/// Agent hosted as a separate HTTP service.
///
/// `POST {base}/stream` answers with an SSE body whose data fields are
/// either raw text fragments or `{"content": "..."}` objects.
/// `POST {base}/setup` prepares the agent's storage.
pub struct RemoteAgent {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct SetupBody<'a> {
    database_uri: Option<&'a str>,
}

#[derive(Deserialize)]
struct ContentFrame {
    content: String,
}

impl RemoteAgent {
    pub fn new(base_url: &str, connect_timeout: Option<Duration>) -> Result<Self, AgentError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: builder.build()?,
        })
    }

    pub fn from_settings(settings: &AgentSettings) -> Result<Option<Self>, AgentError> {
        match settings.url.as_deref() {
            Some(url) if !url.is_empty() => Ok(Some(Self::new(
                url,
                settings.connect_timeout_secs.map(Duration::from_secs),
            )?)),
            _ => Ok(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<reqwest::Response, AgentError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.http.post(&url).json(body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::Status { status, body });
        }
        Ok(resp)
    }
}

/// Extract fragment text from one SSE payload
fn fragment_from_payload(payload: String) -> String {
    if payload.trim_start().starts_with('{') {
        if let Ok(frame) = serde_json::from_str::<ContentFrame>(&payload) {
            return frame.content;
        }
    }
    payload
}

#[async_trait]
impl AgentBackend for RemoteAgent {
    async fn stream_response(&self, request: AgentRequest) -> Result<FragmentStream, AgentError> {
        debug!("[{}] POST {}/stream", request.session_id, self.base_url);
        let resp = self.post("/stream", &request).await?;
        let mut bytes = Box::pin(resp.bytes_stream());

        let stream: FragmentStream = Box::pin(async_stream::stream! {
            let mut decoder = SseDecoder::new();
            'read: loop {
                while let Some(payload) = decoder.next_event() {
                    if payload.trim() == DONE_MARKER {
                        break 'read;
                    }
                    yield Ok(fragment_from_payload(payload));
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => decoder.push(&chunk),
                    Some(Err(e)) => {
                        yield Err(AgentError::Stream(e.to_string()));
                        break 'read;
                    }
                    None => {
                        if let Some(payload) = decoder.finish() {
                            if payload.trim() != DONE_MARKER {
                                yield Ok(fragment_from_payload(payload));
                            }
                        }
                        break 'read;
                    }
                }
            }
        });

        Ok(stream)
    }

    async fn setup(&self, database_uri: Option<&str>) -> Result<(), AgentError> {
        self.post("/setup", &SetupBody { database_uri })
            .await
            .map_err(|e| AgentError::Setup(e.to_string()))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "remote"
    }
}
