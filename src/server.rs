//! HTTP trigger server.
//!
//! Small Axum surface for the cron publisher (or an operator) to
//! trigger cycles: `POST /run` runs one gated cycle, `GET /runs`
//! exposes recent history, `GET /health` is the liveness check.
//! CORS enabled for local tooling.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::scheduler::CycleGate;
use crate::storage::RunStore;
use crate::types::RunResult;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Something that can run one full trade cycle.
#[async_trait::async_trait]
pub trait CycleRunner: Send + Sync {
    async fn run(&self) -> RunResult;
}

pub struct ServerState {
    pub runner: Box<dyn CycleRunner>,
    pub gate: CycleGate,
    pub store: RunStore,
    pub agent_name: String,
}

pub type AppState = Arc<ServerState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub status: String,
    pub mode: String,
    pub exit_code: u8,
    pub stages: usize,
    pub error: Option<String>,
}

impl From<&RunResult> for RunResponse {
    fn from(result: &RunResult) -> Self {
        Self {
            status: result.status.to_string(),
            mode: result.mode.to_string(),
            exit_code: result.status.exit_code(),
            stages: result.stages.len(),
            error: result.error.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Bind and serve until the process is terminated.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Trigger server starting on http://localhost:{port}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind trigger server port {port}"))?;
    axum::serve(listener, app)
        .await
        .context("Trigger server error")?;
    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin("*".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/run", post(trigger_run))
        .route("/runs", get(get_runs))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /health
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "agent": state.agent_name }))
}

/// POST /run — run one cycle behind the overlap gate. Returns 409 when
/// a cycle is already in flight and the policy drops the tick.
async fn trigger_run(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let Some(_guard) = state.gate.acquire().await else {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "cycle already in flight" })),
        );
    };

    let result = state.runner.run().await;
    if let Err(e) = state.store.append(&result) {
        error!(error = %e, "Failed to persist run result");
    }

    let response = RunResponse::from(&result);
    (StatusCode::OK, Json(json!(response)))
}

/// GET /runs — the most recent cycle records.
async fn get_runs(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.store.recent(100) {
        Ok(runs) => (StatusCode::OK, Json(json!({ "runs": runs }))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
