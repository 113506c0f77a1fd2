//! Shared helpers for utamemo-ai integration tests
//!
//! Each test builds the router over a fresh in-memory database and drives
//! it with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;
use utamemo_ai::llm::{CompletionRequest, LanguageModel, LlmError, MockLanguageModel};
use utamemo_ai::AppState;
use utamemo_common::config::LlmConfig;

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync>;

/// Model whose replies are computed by a closure; keeps every request
pub struct FnModel {
    responder: Responder,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FnModel {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for FnModel {
    fn name(&self) -> &'static str {
        "fn"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.responder)(request)
    }
}

/// Router over an empty database, answering with `model`
pub async fn test_app_with(model: Arc<dyn LanguageModel>, mock_mode: bool) -> (Router, SqlitePool) {
    let pool = utamemo_common::db::connect_in_memory()
        .await
        .expect("Failed to create in-memory database");

    let llm = LlmConfig {
        mock_delay_ms: 0,
        ..LlmConfig::default()
    };
    let state = AppState::new(pool.clone(), model, llm, mock_mode);
    (utamemo_ai::build_router(state), pool)
}

/// Router backed by the seeded offline mock
pub async fn mock_app() -> (Router, SqlitePool) {
    test_app_with(Arc::new(MockLanguageModel::with_seed(0, 7)), true).await
}

/// Mock-backed router over a database file in `dir`, with a full connection pool
pub async fn file_backed_mock_app(dir: &std::path::Path) -> (Router, SqlitePool) {
    let pool = utamemo_common::db::init_database(&dir.join("utamemo.db"))
        .await
        .expect("Failed to create database file");

    let llm = LlmConfig {
        mock_delay_ms: 0,
        ..LlmConfig::default()
    };
    let model = Arc::new(MockLanguageModel::with_seed(0, 7));
    let state = AppState::new(pool.clone(), model, llm, true);
    (utamemo_ai::build_router(state), pool)
}

/// Send one request; returns status and JSON body (`Null` when empty)
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }

    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub async fn get(app: &Router, uri: &str, user: Option<&str>) -> (StatusCode, Value) {
    send(app, Method::GET, uri, user, None).await
}

pub async fn post(app: &Router, uri: &str, user: Option<&str>, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, user, Some(body)).await
}

pub async fn put(app: &Router, uri: &str, user: Option<&str>, body: Value) -> (StatusCode, Value) {
    send(app, Method::PUT, uri, user, Some(body)).await
}

pub async fn delete(app: &Router, uri: &str, user: Option<&str>) -> (StatusCode, Value) {
    send(app, Method::DELETE, uri, user, None).await
}

/// Import a song through the API and return the report
pub async fn import(app: &Router, user: Option<&str>, body: Value) -> Value {
    let (status, report) = post(app, "/api/songs/import", user, body).await;
    assert_eq!(status, StatusCode::CREATED, "import failed: {}", report);
    report
}
