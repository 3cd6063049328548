//! Local stand-in for the OpenAI chat completions endpoint.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};

pub const API_KEY: &str = "sk-test";
pub const FRAGMENTS: &[&str] = &["Hello", " from", " the", " mock"];

/// Request bodies the mock has accepted, oldest first
pub type Seen = Arc<Mutex<Vec<Value>>>;

async fn completions(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let expected = format!("Bearer {API_KEY}");
    if auth != Some(expected.as_str()) {
        return (
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"Incorrect API key provided"}}"#,
        )
            .into_response();
    }
    seen.lock().unwrap().push(body);
    event_stream(FRAGMENTS, true)
}

/// Accepts any key and closes the body after the first fragment, before the
/// completion marker.
async fn truncated_completions(State(seen): State<Seen>, Json(body): Json<Value>) -> Response {
    seen.lock().unwrap().push(body);
    event_stream(&FRAGMENTS[..1], false)
}

/// One event per fragment, with a role-only delta first like the real API
fn event_stream(fragments: &[&str], finished: bool) -> Response {
    let mut events = String::from("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n");
    for fragment in fragments {
        let chunk = json!({ "choices": [{ "delta": { "content": fragment } }] });
        events.push_str(&format!("data: {chunk}\n\n"));
    }
    if finished {
        events.push_str("data: [DONE]\n\n");
    }

    ([(header::CONTENT_TYPE, "text/event-stream")], events).into_response()
}

/// Serves `router` on an ephemeral local port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Starts the mock and returns its base URL plus the request log.
pub async fn spawn_mock_openai() -> (String, Seen) {
    let seen: Seen = Arc::default();
    let router = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(seen.clone());
    let addr = serve(router).await;
    (format!("http://{addr}/v1/"), seen)
}

/// Starts a mock whose replies stop short of the completion marker.
pub async fn spawn_truncating_openai() -> (String, Seen) {
    let seen: Seen = Arc::default();
    let router = Router::new()
        .route("/v1/chat/completions", post(truncated_completions))
        .with_state(seen.clone());
    let addr = serve(router).await;
    (format!("http://{addr}/v1/"), seen)
}

pub fn expected_reply() -> String {
    FRAGMENTS.concat()
}
