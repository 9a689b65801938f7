#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use scan_orchestrator::{
    config::Settings,
    create_router,
    models::format_scan_id,
    repositories::InMemoryStateStore,
    services::{RandomSource, ScriptedRandom},
    AppState,
};
use serde_json::Value;
use tower::ServiceExt;

pub struct TestHarness {
    pub state: AppState,
    pub store: Arc<InMemoryStateStore>,
}

impl TestHarness {
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }
}

/// App state over a fresh in-memory store with default test settings.
pub async fn harness(rng: ScriptedRandom) -> TestHarness {
    harness_with_store(Arc::new(InMemoryStateStore::new()), rng).await
}

pub async fn harness_with_store(store: Arc<InMemoryStateStore>, rng: ScriptedRandom) -> TestHarness {
    let rng: Arc<dyn RandomSource> = Arc::new(rng);
    let state = AppState::with_store(Settings::for_tests(), store.clone(), rng)
        .await
        .expect("Failed to create test app state");
    TestHarness { state, store }
}

/// Scan id for today's `sequence`.
pub fn today_id(sequence: u32) -> String {
    format_scan_id(chrono::Local::now().date_naive(), sequence)
}

/// Helper to extract response body as bytes
pub async fn extract_body(response: axum::response::Response) -> Vec<u8> {
    use axum::body::to_bytes;
    let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    body.to_vec()
}

/// Send one request and decode the JSON response (Null when empty).
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = extract_body(response).await;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
