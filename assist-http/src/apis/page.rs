use axum::response::Html;
use tracing::info;

const ASSISTANT_PAGE: &str = include_str!("../../assets/assistant.html");

/// GET /assistant/ - Chat page
pub async fn handle_assistant_page() -> Html<&'static str> {
    info!("GET /assistant/");
    Html(ASSISTANT_PAGE)
}
