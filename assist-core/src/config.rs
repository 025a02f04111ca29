use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Environment variable holding the database connection string handed to the agent
pub const DATABASE_URI_ENV: &str = "SQLALCHEMY_DATABASE_URI";

/// Top-level assistant configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub server: ServerSettings,
    pub agent: AgentSettings,
    pub sessions: SessionSettings,
    pub auth: AuthSettings,
    /// Connection string passed through to the agent on every call
    pub database_uri: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address (e.g., "127.0.0.1:8088")
    pub address: String,
    /// Path prefix the assistant view is mounted under
    pub base_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Base URL of the remote agent service; `None` selects the offline echo agent
    pub url: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Maximum number of tracked sessions (None = unlimited)
    pub max_sessions: Option<usize>,
    /// Sessions idle for longer than this are evicted (None = never)
    pub idle_ttl_secs: Option<u64>,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Bearer token -> username
    pub tokens: HashMap<String, String>,
    /// Admit callers without an Authorization header as `anonymous`
    pub allow_anonymous: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8088".into(),
            base_path: "/aisupersetassistantview".into(),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            url: None,
            connect_timeout_secs: Some(10),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_sessions: Some(10_000),
            idle_ttl_secs: Some(24 * 60 * 60),
            sweep_interval_secs: 300,
        }
    }
}

impl SessionSettings {
    pub fn idle_ttl(&self) -> Option<Duration> {
        self.idle_ttl_secs.map(Duration::from_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl AssistantConfig {
    /// Default config file location: `~/.config/assist/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("assist").join("config.json"))
    }

    /// Load a config file; missing fields fall back to defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load from `path` if given, else from the default location if it exists,
    /// else defaults. The database URI is then filled from the environment
    /// when the file did not set one.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load(&path)?,
                _ => Self::default(),
            },
        };
        if config.database_uri.is_none() {
            config.database_uri = std::env::var(DATABASE_URI_ENV).ok().filter(|v| !v.is_empty());
        }
        Ok(config)
    }
}
