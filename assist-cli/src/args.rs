use anyhow::{bail, Result};
use assist_core::config::{AssistantConfig, DATABASE_URI_ENV};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "assist", version, about = "Chat relay between the BI assistant page and an agent service")]
pub struct Args {
    /// Config file (defaults to ~/.config/assist/config.json when present)
    #[arg(short, long, env = "ASSIST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind, e.g. 0.0.0.0:8088
    #[arg(long, env = "ASSIST_ADDRESS")]
    pub address: Option<String>,

    /// Path prefix the assistant is mounted under
    #[arg(long, env = "ASSIST_BASE_PATH")]
    pub base_path: Option<String>,

    /// Agent service base URL; the echo agent is used when unset
    #[arg(long, env = "ASSIST_AGENT_URL")]
    pub agent_url: Option<String>,

    /// Database connection string handed to the agent
    #[arg(long, env = DATABASE_URI_ENV, hide_env_values = true)]
    pub database_uri: Option<String>,

    /// API token as TOKEN=USERNAME (repeatable)
    #[arg(long = "token", env = "ASSIST_TOKENS", value_delimiter = ',', hide_env_values = true)]
    pub tokens: Vec<String>,

    /// Admit requests without a token as "anonymous"
    #[arg(long)]
    pub allow_anonymous: bool,

    /// Maximum number of tracked sessions (0 = unlimited)
    #[arg(long)]
    pub max_sessions: Option<usize>,

    /// Evict sessions idle for this many seconds (0 = never)
    #[arg(long)]
    pub session_ttl: Option<u64>,
}

fn parse_token(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((token, user)) if !token.trim().is_empty() && !user.trim().is_empty() => {
            Ok((token.trim().to_string(), user.trim().to_string()))
        }
        _ => bail!("invalid token '{}', expected TOKEN=USERNAME", raw),
    }
}

impl Args {
    /// Load the config file then apply flag and environment overrides
    pub fn into_config(self) -> Result<AssistantConfig> {
        let mut config = AssistantConfig::load_or_default(self.config.as_deref())?;

        if let Some(address) = self.address {
            config.server.address = address;
        }
        if let Some(base_path) = self.base_path {
            config.server.base_path = base_path;
        }
        if let Some(url) = self.agent_url {
            config.agent.url = Some(url);
        }
        if let Some(uri) = self.database_uri.filter(|u| !u.is_empty()) {
            config.database_uri = Some(uri);
        }
        for raw in &self.tokens {
            let (token, user) = parse_token(raw)?;
            config.auth.tokens.insert(token, user);
        }
        if self.allow_anonymous {
            config.auth.allow_anonymous = true;
        }
        if let Some(max) = self.max_sessions {
            config.sessions.max_sessions = (max > 0).then_some(max);
        }
        if let Some(ttl) = self.session_ttl {
            config.sessions.idle_ttl_secs = (ttl > 0).then_some(ttl);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("assist").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "server": { "address": "127.0.0.1:1" }, "agent": { "url": "http://file" } }"#).unwrap();

        let config = parse(&[
            "--config", path.to_str().unwrap(),
            "--address", "0.0.0.0:9999",
            "--token", "abc=alice",
            "--token", "def=bob",
            "--max-sessions", "0",
            "--session-ttl", "60",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.server.address, "0.0.0.0:9999");
        assert_eq!(config.agent.url.as_deref(), Some("http://file"));
        assert_eq!(config.auth.tokens.len(), 2);
        assert_eq!(config.auth.tokens["def"], "bob");
        assert_eq!(config.sessions.max_sessions, None);
        assert_eq!(config.sessions.idle_ttl_secs, Some(60));
    }

    #[test]
    fn malformed_token_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();

        let err = parse(&["--config", path.to_str().unwrap(), "--token", "no-user"])
            .into_config()
            .unwrap_err();
        assert!(err.to_string().contains("expected TOKEN=USERNAME"));
    }
}
