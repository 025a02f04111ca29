use assist_core::{config::AuthSettings, AssistantConfig, Relay};
use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::apis;
use crate::auth::require_auth;
use crate::error::handle_panic;

/// Configuration for the HTTP server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Server bind address (e.g., "127.0.0.1:8088")
    pub address: String,
    /// Path prefix the assistant routes are mounted under
    pub base_path: String,
    /// Bearer tokens accepted by the API
    pub auth: AuthSettings,
}

impl ServerConfig {
    /// Create a new server config with the given address and default settings
    pub fn new(address: String) -> Self {
        let defaults = AssistantConfig::default();
        Self {
            address,
            base_path: defaults.server.base_path,
            auth: defaults.auth,
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_auth(mut self, auth: AuthSettings) -> Self {
        self.auth = auth;
        self
    }
}

impl From<&AssistantConfig> for ServerConfig {
    fn from(config: &AssistantConfig) -> Self {
        Self::new(config.server.address.clone())
            .with_base_path(config.server.base_path.clone())
            .with_auth(config.auth.clone())
    }
}

/// Server state shared by all handlers
#[derive(Clone)]
pub struct ServerState {
    pub relay: Arc<Relay>,
    pub auth: Arc<AuthSettings>,
}

impl ServerState {
    pub fn new(relay: Arc<Relay>, auth: AuthSettings) -> Self {
        Self {
            relay,
            auth: Arc::new(auth),
        }
    }
}

/// Normalize a mount prefix: leading slash, no trailing slash, "" for root
fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Build the application router
pub fn router(state: ServerState, base_path: &str) -> Router {
    // The page shell is public; it collects the token the API routes require
    let assistant = Router::new()
        .route("/api/new_session", post(apis::assistant::handle_new_session))
        .route("/api/chat", post(apis::assistant::handle_chat))
        .route("/api/chat_stream", post(apis::assistant::handle_chat_stream))
        .route("/api/clear_session", post(apis::assistant::handle_clear_session))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .route("/assistant/", get(apis::page::handle_assistant_page));

    let base_path = normalize_base_path(base_path);
    let app = if base_path.is_empty() {
        assistant
    } else {
        Router::new().nest(&base_path, assistant)
    };

    app.route("/health", get(handle_health))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn handle_health(State(state): State<ServerState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.relay.sessions().count().await,
    }))
}

/// Start the HTTP server; returns once `shutdown` is cancelled
pub async fn start_server(
    config: ServerConfig,
    relay: Arc<Relay>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let base_path = normalize_base_path(&config.base_path);
    let agent_name = relay.agent().name().to_string();
    let state = ServerState::new(relay, config.auth.clone());
    let app = router(state, &base_path);

    let listener = tokio::net::TcpListener::bind(&config.address).await?;

    println!("Server starting on \x1b[1mhttp://{}\x1b[0m", config.address);
    println!("  Agent: \x1b[1m{}\x1b[0m", agent_name);
    if config.auth.tokens.is_empty() {
        println!("  Auth: \x1b[1m{}\x1b[0m", if config.auth.allow_anonymous { "anonymous" } else { "no tokens configured, all requests rejected" });
    } else {
        println!("  Auth: \x1b[1m{} token(s)\x1b[0m", config.auth.tokens.len());
    }
    println!("\nAvailable endpoints:");
    println!("  \x1b[1mGET  {}/assistant/\x1b[0m          - Chat page", base_path);
    println!("  \x1b[1mPOST {}/api/new_session\x1b[0m     - Start a session", base_path);
    println!("  \x1b[1mPOST {}/api/chat\x1b[0m            - Chat (one-shot)", base_path);
    println!("  \x1b[1mPOST {}/api/chat_stream\x1b[0m     - Chat (streaming)", base_path);
    println!("  \x1b[1mPOST {}/api/clear_session\x1b[0m   - Forget a session", base_path);
    println!("  \x1b[1mGET  /health\x1b[0m");
    println!("\nPress Ctrl+C to stop\n");

    info!("HTTP server listening on {}", config.address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
