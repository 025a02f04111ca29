use async_trait::async_trait;
use futures::StreamExt;

use super::{AgentBackend, AgentRequest, FragmentStream};
use crate::error::AgentError;

/// Offline agent that streams the message back word by word.
/// Used when no agent service is configured.
#[derive(Debug, Default, Clone)]
pub struct EchoAgent;

#[async_trait]
impl AgentBackend for EchoAgent {
    async fn stream_response(&self, request: AgentRequest) -> Result<FragmentStream, AgentError> {
        let mut fragments = vec![format!("[echo:{}] ", request.username)];
        let words: Vec<&str> = request.message.split_whitespace().collect();
        for (i, word) in words.iter().enumerate() {
            if i + 1 < words.len() {
                fragments.push(format!("{} ", word));
            } else {
                fragments.push(word.to_string());
            }
        }
        Ok(futures::stream::iter(fragments.into_iter().map(Ok)).boxed())
    }

    async fn setup(&self, _database_uri: Option<&str>) -> Result<(), AgentError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "echo"
    }
}
