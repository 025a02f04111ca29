pub mod agent;
pub mod config;
pub mod error;
pub mod event;
pub mod relay;
pub mod session;

pub use agent::{AgentBackend, AgentRequest, EchoAgent, FragmentStream, RemoteAgent};
pub use config::AssistantConfig;
pub use error::{AgentError, AssistError, Result};
pub use event::StreamEvent;
pub use relay::{Relay, RelayStream, Reply, FALLBACK_REPLY, STREAM_ERROR_MESSAGE};
pub use session::{RegistryConfig, SessionInfo, SessionRegistry, ANONYMOUS};
