mod args;

use anyhow::Result;
use assist_core::agent::spawn_storage_setup;
use assist_core::{AgentBackend, EchoAgent, RegistryConfig, Relay, RemoteAgent, SessionRegistry};
use assist_http::{start_server, ServerConfig};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use args::Args;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Args::parse().into_config()?;

    let agent: Arc<dyn AgentBackend> = match RemoteAgent::from_settings(&config.agent)? {
        Some(remote) => {
            info!("Using agent service at {}", remote.base_url());
            Arc::new(remote)
        }
        None => {
            warn!("No agent URL configured, falling back to the echo agent");
            Arc::new(EchoAgent)
        }
    };
    if config.database_uri.is_none() {
        warn!("No database URI configured; the agent will receive none");
    }

    let sessions = Arc::new(SessionRegistry::new(RegistryConfig::from(&config.sessions)));
    let relay = Arc::new(Relay::new(agent.clone(), sessions.clone(), config.database_uri.clone()));

    // Storage setup runs off the request path; failures are only logged
    spawn_storage_setup(agent, config.database_uri.clone());

    let shutdown = CancellationToken::new();
    let sweeper = sessions
        .clone()
        .spawn_sweeper(config.sessions.sweep_interval(), shutdown.clone());

    let on_ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            on_ctrl_c.cancel();
        }
    });

    let result = start_server(ServerConfig::from(&config), relay, shutdown.clone()).await;

    shutdown.cancel();
    let _ = sweeper.await;
    result
}
