use assist_core::{
    config::AuthSettings, AgentBackend, AgentError, AgentRequest, FragmentStream, Relay,
    SessionRegistry, StreamEvent, FALLBACK_REPLY, STREAM_ERROR_MESSAGE,
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use futures::StreamExt;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use crate::{router, ServerState};

const BASE: &str = "/aisupersetassistantview";
const TOKEN: &str = "t0ken";

struct FakeAgent {
    fragments: Vec<&'static str>,
    fail: bool,
    calls: AtomicUsize,
    users: Mutex<Vec<String>>,
}

impl FakeAgent {
    fn new(fragments: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            fragments,
            fail: false,
            calls: AtomicUsize::new(0),
            users: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fragments: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
            users: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl AgentBackend for FakeAgent {
    async fn stream_response(&self, request: AgentRequest) -> Result<FragmentStream, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.users.lock().unwrap().push(request.username);
        if self.fail {
            return Err(AgentError::Request("agent offline".into()));
        }
        let fragments: Vec<Result<String, AgentError>> =
            self.fragments.iter().map(|f| Ok(f.to_string())).collect();
        Ok(futures::stream::iter(fragments).boxed())
    }

    async fn setup(&self, _database_uri: Option<&str>) -> Result<(), AgentError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

fn auth_settings(allow_anonymous: bool) -> AuthSettings {
    let mut auth = AuthSettings::default();
    auth.tokens.insert(TOKEN.into(), "alice".into());
    auth.allow_anonymous = allow_anonymous;
    auth
}

fn app_with(agent: Arc<FakeAgent>, allow_anonymous: bool) -> (Router, Arc<Relay>) {
    let relay = Arc::new(Relay::new(agent, Arc::new(SessionRegistry::default()), None));
    let state = ServerState::new(relay.clone(), auth_settings(allow_anonymous));
    (router(state, BASE), relay)
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl TestResponse {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    TestResponse {
        status,
        headers,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

async fn post(app: &Router, path: &str, body: Value) -> TestResponse {
    let request = Request::builder()
        .method("POST")
        .uri(format!("{}{}", BASE, path))
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn post_unauthenticated(app: &Router, path: &str, body: Value) -> TestResponse {
    let request = Request::builder()
        .method("POST")
        .uri(format!("{}{}", BASE, path))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

fn is_uuid(value: &Value) -> bool {
    value.as_str().map(|s| uuid::Uuid::parse_str(s).is_ok()).unwrap_or(false)
}

// ── Authentication ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_endpoints_require_authentication() {
    let agent = FakeAgent::new(vec!["hi"]);
    let (app, _) = app_with(agent.clone(), false);

    for path in ["/api/new_session", "/api/chat", "/api/chat_stream", "/api/clear_session"] {
        let resp = post_unauthenticated(&app, path, json!({"message": "hello"})).await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED, "{}", path);
        assert_eq!(resp.json()["error"]["type"], "unauthorized");
        assert_eq!(resp.json()["error"]["message"], "Authentication required");
    }
    assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_wrong_token_is_rejected() {
    let (app, _) = app_with(FakeAgent::new(vec![]), false);
    let request = Request::builder()
        .method("POST")
        .uri(format!("{}/api/new_session", BASE))
        .header(header::AUTHORIZATION, "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_anonymous_mode_admits_callers_without_token() {
    let agent = FakeAgent::new(vec!["ok"]);
    let (app, _) = app_with(agent.clone(), true);
    let resp = post_unauthenticated(&app, "/api/chat", json!({"message": "hi"})).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(agent.users.lock().unwrap().as_slice(), ["anonymous"]);
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _) = app_with(FakeAgent::new(vec![]), false);
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = send(&app, request).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "ok");
    assert!(resp.json().get("agent").is_none());
    assert_eq!(resp.json()["sessions"], 0);
}

#[tokio::test]
async fn test_chat_page_loads_without_token() {
    // Anonymous access is off; a browser navigation carries no Authorization header
    let (app, _) = app_with(FakeAgent::new(vec![]), false);
    let request = Request::builder()
        .uri(format!("{}/assistant/", BASE))
        .body(Body::empty())
        .unwrap();
    let resp = send(&app, request).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
    assert!(resp.body.contains("chat_stream"));
    assert!(resp.body.contains("Authorization"));

    // The API behind the page stays protected
    let resp = post_unauthenticated(&app, "/api/chat", json!({"message": "hi"})).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

// ── New session ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_new_session_registers_caller() {
    let (app, relay) = app_with(FakeAgent::new(vec![]), false);
    let resp = post(&app, "/api/new_session", json!({})).await;
    assert_eq!(resp.status, StatusCode::OK);

    let body = resp.json();
    assert!(is_uuid(&body["session_id"]));
    assert_eq!(body["status"], "created");
    assert_eq!(body["message"], "New session initialized");

    let info = relay.sessions().get(body["session_id"].as_str().unwrap()).await.unwrap();
    assert_eq!(info.username, "alice");
}

// ── One-shot chat ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_chat_rejects_blank_message_without_calling_agent() {
    let agent = FakeAgent::new(vec!["unused"]);
    let (app, _) = app_with(agent.clone(), false);

    for body in [json!({"message": ""}), json!({"message": "   \n\t"}), json!({})] {
        let resp = post(&app, "/api/chat", body).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.json()["error"]["type"], "invalid_request");
        assert_eq!(resp.json()["error"]["message"], "Message is required");
    }
    assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_chat_rejects_malformed_json() {
    let (app, _) = app_with(FakeAgent::new(vec![]), false);
    let request = Request::builder()
        .method("POST")
        .uri(format!("{}/api/chat", BASE))
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
        .body(Body::from("{ nope"))
        .unwrap();
    let resp = send(&app, request).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["error"]["type"], "invalid_request");
}

#[tokio::test]
async fn test_chat_returns_full_response() {
    let agent = FakeAgent::new(vec!["Top ", "dashboard: ", "Sales"]);
    let (app, relay) = app_with(agent.clone(), false);

    let resp = post(&app, "/api/chat", json!({"message": "  which dashboard?  "})).await;
    assert_eq!(resp.status, StatusCode::OK);

    let body = resp.json();
    assert_eq!(body["response"], "Top dashboard: Sales");
    assert!(is_uuid(&body["session_id"]));
    assert!(chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).is_ok());
    assert!(relay.sessions().contains(body["session_id"].as_str().unwrap()).await);
    assert_eq!(agent.users.lock().unwrap().as_slice(), ["alice"]);
}

#[tokio::test]
async fn test_chat_reuses_known_session() {
    let (app, relay) = app_with(FakeAgent::new(vec!["ok"]), false);
    let id = relay.sessions().create_session(Some("alice")).await;

    let resp = post(&app, "/api/chat", json!({"message": "hi", "session_id": id.clone()})).await;
    assert_eq!(resp.json()["session_id"], id);
    assert_eq!(relay.sessions().count().await, 1);
}

#[tokio::test]
async fn test_chat_degrades_when_agent_fails() {
    let (app, _) = app_with(FakeAgent::failing(), false);
    let resp = post(&app, "/api/chat", json!({"message": "hi", "session_id": "gone"})).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["response"], FALLBACK_REPLY);
    assert!(is_uuid(&body["session_id"]));
}

#[tokio::test]
async fn test_concurrent_chats_get_distinct_sessions() {
    let (app, _) = app_with(FakeAgent::new(vec!["ok"]), false);
    let (a, b) = tokio::join!(
        post(&app, "/api/chat", json!({"message": "one"})),
        post(&app, "/api/chat", json!({"message": "two"}))
    );
    assert!(is_uuid(&a.json()["session_id"]));
    assert!(is_uuid(&b.json()["session_id"]));
    assert_ne!(a.json()["session_id"], b.json()["session_id"]);
}

// ── Streaming chat ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_chat_stream_frames_and_headers() {
    let (app, _) = app_with(FakeAgent::new(vec!["Hello", "", ", world"]), false);
    let resp = post(&app, "/api/chat_stream", json!({"message": "greet me"})).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.headers[header::CONTENT_TYPE], "text/plain; charset=utf-8");
    assert_eq!(resp.headers[header::CACHE_CONTROL], "no-cache");
    assert!(resp.body.starts_with("data: {\"type\":\"session\""));
    assert!(resp.body.ends_with("data: {\"type\":\"done\"}\n\n"));

    let events = StreamEvent::parse_body(&resp.body);
    assert_eq!(events.len(), 4);
    assert!(matches!(&events[0], StreamEvent::Session { session_id } if uuid::Uuid::parse_str(session_id).is_ok()));
    assert_eq!(events[1], StreamEvent::Chunk { content: "Hello".into() });
    assert_eq!(events[2], StreamEvent::Chunk { content: ", world".into() });
    assert_eq!(events[3], StreamEvent::Done);
}

#[tokio::test]
async fn test_chat_stream_with_no_fragments() {
    let (app, _) = app_with(FakeAgent::new(vec![]), false);
    let resp = post(&app, "/api/chat_stream", json!({"message": "anything?"})).await;
    let events = StreamEvent::parse_body(&resp.body);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1], StreamEvent::Done);
}

#[tokio::test]
async fn test_chat_stream_rejects_blank_message() {
    let agent = FakeAgent::new(vec![]);
    let (app, _) = app_with(agent.clone(), false);
    let resp = post(&app, "/api/chat_stream", json!({"message": " "})).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["error"]["message"], "Message is required");
    assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_chat_stream_reports_agent_failure_in_band() {
    let (app, relay) = app_with(FakeAgent::failing(), false);
    let resp = post(&app, "/api/chat_stream", json!({"message": "hi"})).await;
    assert_eq!(resp.status, StatusCode::OK);

    let events = StreamEvent::parse_body(&resp.body);
    assert_eq!(events.len(), 2);
    let StreamEvent::Session { session_id } = &events[0] else {
        panic!("expected session event first, got {:?}", events[0]);
    };
    assert!(relay.sessions().contains(session_id).await);
    assert_eq!(
        events[1],
        StreamEvent::Error {
            content: STREAM_ERROR_MESSAGE.into()
        }
    );
}

// ── Clear session ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_clear_session_lifecycle() {
    let (app, relay) = app_with(FakeAgent::new(vec![]), false);
    let created = post(&app, "/api/new_session", json!({})).await.json();
    let id = created["session_id"].clone();

    let resp = post(&app, "/api/clear_session", json!({"session_id": id.clone()})).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["message"], "Session cleared successfully");
    assert_eq!(relay.sessions().count().await, 0);

    let again = post(&app, "/api/clear_session", json!({"session_id": id})).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
    assert_eq!(again.json()["error"]["type"], "not_found");
    assert_eq!(again.json()["error"]["message"], "Session not found");
}

#[tokio::test]
async fn test_clear_session_without_id_is_not_found() {
    let (app, _) = app_with(FakeAgent::new(vec![]), false);
    let resp = post(&app, "/api/clear_session", json!({})).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
