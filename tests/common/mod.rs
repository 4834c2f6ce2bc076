//! In-process stub of the Bravo Zero API for integration tests.

#![allow(dead_code)]

use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use bravozero::ClientConfig;

pub const API_KEY: &str = "test-key";
pub const AGENT_ID: &str = "agent-test";

/// What the stub saw for one request.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub agent_id: Option<String>,
    pub attestation: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Clone, Default)]
pub struct StubState {
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    flaky_failures: Arc<AtomicU32>,
}

impl StubState {
    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }

    pub fn last(&self, path: &str) -> Option<SeenRequest> {
        self.requests().into_iter().rev().find(|r| r.path == path)
    }
}

pub struct Stub {
    pub addr: SocketAddr,
    pub state: StubState,
}

impl Stub {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(API_KEY)
            .with_agent_id(AGENT_ID)
            .with_base_url(self.base_url())
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Start the stub on the current runtime.
pub async fn start() -> Stub {
    init_tracing();
    let state = StubState::default();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Stub { addr, state }
}

/// Start the stub on a runtime of its own, for blocking clients.
pub fn start_in_thread() -> Stub {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let stub = start().await;
            tx.send(stub).unwrap();
            std::future::pending::<()>().await;
        });
    });
    rx.recv().unwrap()
}

fn router(state: StubState) -> Router {
    Router::new()
        .route("/v1/constitution/evaluate", post(evaluate))
        .route("/v1/constitution/omega", get(omega))
        .route("/v1/constitution/health", get(health))
        .route("/v1/constitution/alerts", get(alerts))
        .route("/v1/constitution/proposals", post(proposals))
        .route("/v1/constitution/rules", get(rate_limited))
        .route("/v1/constitution/values", get(flaky_values))
        .route("/v1/memory/record", post(record))
        .route("/v1/memory/query", post(query))
        .route("/v1/memory/edges", post(unavailable))
        .route(
            "/v1/memory/:id",
            get(get_memory).patch(update_memory).delete(delete_memory),
        )
        .route("/v1/memory/:id/related", get(related))
        .route("/v1/bridge/files", get(list_files))
        .route("/v1/bridge/file", get(read_file).put(write_file).delete(delete_file))
        .route("/v1/bridge/file/bytes", get(read_bytes))
        .route("/v1/bridge/file/info", get(file_info))
        .route("/v1/bridge/sync", post(sync))
        .route("/v1/bridge/sync/status", get(sync_status))
        .layer(middleware::from_fn_with_state(state.clone(), inspect))
        .with_state(state)
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn inspect(State(state): State<StubState>, request: Request, next: Next) -> Response {
    let headers = request.headers();
    state.seen.lock().unwrap().push(SeenRequest {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        agent_id: header_str(headers, "x-agent-id"),
        attestation: header_str(headers, "x-persona-attestation"),
        user_agent: header_str(headers, "user-agent"),
    });

    if header_str(headers, "x-api-key").as_deref() != Some(API_KEY) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "invalid API key"})),
        )
            .into_response();
    }
    next.run(request).await
}

async fn evaluate(Json(body): Json<Value>) -> Json<Value> {
    let action = body["action"].as_str().unwrap_or_default();
    let (decision, reasoning) = match action {
        "delete_database" => ("deny", "destructive action outside task scope"),
        "deploy" => ("escalate", "production changes need human approval"),
        _ => ("permit", "read access within project scope"),
    };
    Json(json!({
        "requestId": format!("req-{}", action),
        "decision": decision,
        "confidence": 0.93,
        "alignmentScore": 0.88,
        "appliedRules": [
            {"ruleId": "r-1", "name": "project-scope", "matched": true, "contribution": 0.6},
            {"ruleId": "r-2", "name": "no-secrets", "matched": false, "contribution": 0.0}
        ],
        "reasoning": reasoning,
        "evaluatedAt": Utc::now()
    }))
}

async fn omega() -> Json<Value> {
    Json(json!({
        "omega": 0.87,
        "components": {"alignment": 0.9, "safety": 0.84},
        "trend": "improving",
        "timestamp": Utc::now()
    }))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "version": "2.4.1", "components": {"memory": "ok"}}))
}

async fn alerts() -> Json<Value> {
    Json(json!({"alerts": [
        {"severity": "high", "title": "Omega dropped below threshold", "id": "a-1"},
        {"severity": "low", "title": "Proposal expiring soon"}
    ]}))
}

async fn proposals(Json(body): Json<Value>) -> Json<Value> {
    let slug = body["title"]
        .as_str()
        .unwrap_or_default()
        .to_lowercase()
        .replace(' ', "-");
    Json(json!({
        "id": format!("prop-{}", slug),
        "votingDeadline": Utc::now() + Duration::days(7),
        "status": "voting"
    }))
}

async fn rate_limited() -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, "7")],
        Json(json!({"error": "slow down"})),
    )
        .into_response()
}

/// Fails with 503 once, then succeeds.
async fn flaky_values(State(state): State<StubState>) -> Response {
    if state.flaky_failures.fetch_add(1, Ordering::SeqCst) == 0 {
        return (StatusCode::SERVICE_UNAVAILABLE, "warming up").into_response();
    }
    Json(json!({"honesty": 1.0, "helpfulness": 0.9})).into_response()
}

async fn unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"detail": "graph store offline"}))).into_response()
}

fn memory_json(id: &str, content: &str, importance: f64, tags: Value, namespace: &str) -> Value {
    json!({
        "id": id,
        "content": content,
        "memoryType": "semantic",
        "importance": importance,
        "namespace": namespace,
        "tags": tags,
        "createdAt": Utc::now(),
        "lastAccessedAt": Utc::now()
    })
}

async fn record(Json(body): Json<Value>) -> Json<Value> {
    Json(memory_json(
        "mem-1",
        body["content"].as_str().unwrap_or_default(),
        body["importance"].as_f64().unwrap_or_default(),
        body["tags"].clone(),
        body["namespace"].as_str().unwrap_or("default"),
    ))
}

async fn query(Json(body): Json<Value>) -> Json<Value> {
    let ns = body["namespace"].as_str().unwrap_or(AGENT_ID);
    Json(json!({"results": [
        {"relevance": 0.41, "memory": memory_json("mem-a", "Uses tabs", 0.3, json!([]), ns)},
        {"relevance": 0.92, "memory": memory_json("mem-b", "User prefers TypeScript", 0.8, json!(["language"]), ns)},
        {"relevance": 0.71, "memory": memory_json("mem-c", "Likes strict mode", 0.6, json!([]), ns)}
    ]}))
}

fn file_json(path: &str, is_directory: bool, size: u64) -> Value {
    json!({
        "path": path,
        "name": path.rsplit('/').next().unwrap_or(path),
        "size": size,
        "isDirectory": is_directory,
        "modifiedAt": Utc::now()
    })
}

fn not_found(path: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": format!("no such file: {}", path)})),
    )
        .into_response()
}

async fn list_files(Query(params): Query<HashMap<String, String>>) -> Response {
    let path = params.get("path").cloned().unwrap_or_default();
    if path == "/missing" {
        return not_found(&path);
    }
    Json(json!({
        "path": path,
        "files": [
            file_json(&format!("{}/src", path), true, 0),
            file_json(&format!("{}/README.md", path), false, 512)
        ]
    }))
    .into_response()
}

async fn read_file(Query(params): Query<HashMap<String, String>>) -> Response {
    match params.get("path").map(String::as_str) {
        Some("/project/src/main.py") => Json(json!({"content": "print('hello')\n"})).into_response(),
        Some(other) => not_found(other),
        None => (StatusCode::BAD_REQUEST, "path required").into_response(),
    }
}

async fn read_bytes(Query(params): Query<HashMap<String, String>>) -> Response {
    if params.get("path").map(String::as_str) != Some("/project/logo.png") {
        return not_found("bytes");
    }
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        vec![0x89u8, b'P', b'N', b'G', 0x00, 0xff],
    )
        .into_response()
}

async fn write_file(Json(body): Json<Value>) -> Json<Value> {
    let path = body["path"].as_str().unwrap_or_default();
    let size = body["content"].as_str().map(str::len).unwrap_or_default() as u64;
    Json(file_json(path, false, size))
}

async fn delete_file(Query(params): Query<HashMap<String, String>>) -> Response {
    match params.get("path") {
        Some(path) if path == "/missing" => not_found(path),
        _ => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn get_memory(Path(id): Path<String>) -> Response {
    if id == "mem-gone" {
        return not_found(&id);
    }
    Json(memory_json(&id, "User prefers TypeScript", 0.8, json!(["language"]), AGENT_ID))
        .into_response()
}

async fn update_memory(Path(id): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    Json(memory_json(
        &id,
        body["content"].as_str().unwrap_or("User prefers TypeScript"),
        body["importance"].as_f64().unwrap_or(0.8),
        body.get("tags").cloned().unwrap_or_else(|| json!(["language"])),
        AGENT_ID,
    ))
}

async fn delete_memory(Path(id): Path<String>) -> Response {
    if id == "mem-gone" {
        return not_found(&id);
    }
    StatusCode::NO_CONTENT.into_response()
}

/// Edges deliberately out of strength order; echoes the filters it received.
async fn related(
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let relationship = params.get("relationship").cloned().unwrap_or_default();
    let linked = |target: &str, strength: f64| {
        let mut memory = memory_json(target, &format!("linked to {}", id), 0.5, json!([]), AGENT_ID);
        memory["metadata"] = json!({
            "relationship": relationship,
            "minStrength": params.get("minStrength"),
            "limit": params.get("limit"),
        });
        json!({"memory": memory, "edgeStrength": strength})
    };
    Json(json!({"results": [
        linked("mem-weak", 0.3),
        linked("mem-strong", 0.9),
        linked("mem-mid", 0.6)
    ]}))
}

async fn file_info(Query(params): Query<HashMap<String, String>>) -> Response {
    match params.get("path") {
        Some(path) if path == "/missing" => not_found(path),
        Some(path) => Json(file_json(path, false, 42)).into_response(),
        None => (StatusCode::BAD_REQUEST, "path required").into_response(),
    }
}

async fn sync(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "path": body["path"],
        "synced": true,
        "lastSyncAt": Utc::now(),
        "pendingChanges": 0
    }))
}

async fn sync_status(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!({
        "path": params.get("path"),
        "synced": false,
        "pendingChanges": 3
    }))
}
