//! JSON HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Status, version, section count, build time |
//! | `POST` | `/chat` | Answer a question from the vault |
//! | `POST` | `/index/rebuild` | Rescan the vault and swap in a new index |
//! | `POST` | `/classify` | Classify a query without answering it |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "text must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `formatting_unavailable` (503),
//! `internal` (500). A `formatting_unavailable` body also carries the
//! extracted `records` and `sources`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use vaultqa_core::classify::{classify, QueryClass, Route};
use vaultqa_core::models::ExtractedRecord;

use crate::answer::{AnswerOutcome, Answerer};
use crate::formatter::Turn;
use crate::state::RebuildReport;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    answerer: Arc<Answerer>,
}

/// Build the router with all routes and CORS.
pub fn build_router(answerer: Arc<Answerer>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/chat", post(handle_chat))
        .route("/index/rebuild", post(handle_rebuild))
        .route("/classify", post(handle_classify))
        .layer(cors)
        .with_state(AppState { answerer })
}

/// Serve on `bind` until the process is terminated.
pub async fn run_server(bind: &str, answerer: Arc<Answerer>) -> anyhow::Result<()> {
    let app = build_router(answerer);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    println!("vaultqa server listening on http://{}", listener.local_addr()?);
    tracing::info!(bind, "server started");

    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    records: Option<Vec<ExtractedRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sources: Option<Vec<String>>,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    records: Option<Vec<ExtractedRecord>>,
    sources: Option<Vec<String>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
            records: self.records,
            sources: self.sources,
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code: code.to_string(),
        message: message.into(),
        records: None,
        sources: None,
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    app_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

/// Constructs a 500 error.
fn internal(message: impl Into<String>) -> AppError {
    app_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

/// Constructs a 503 error carrying what was extracted before formatting
/// failed.
fn formatting_unavailable(
    message: impl Into<String>,
    records: Vec<ExtractedRecord>,
    sources: Vec<String>,
) -> AppError {
    AppError {
        records: Some(records),
        sources: Some(sources),
        ..app_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "formatting_unavailable",
            message,
        )
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    sections: usize,
    built_at: DateTime<Utc>,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.answerer.index().snapshot();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sections: snapshot.index.len(),
        built_at: snapshot.built_at,
    })
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    text: String,
    #[serde(default)]
    history: Vec<Turn>,
}

#[derive(Serialize)]
struct ChatResponse {
    reply: String,
    outcome: String,
    sources: Vec<String>,
    records: Vec<ExtractedRecord>,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.text.trim().is_empty() {
        return Err(bad_request("text must not be empty"));
    }

    let outcome = state
        .answerer
        .answer(&req.text, &req.history)
        .await
        .map_err(|e| internal(e.to_string()))?;

    match outcome {
        AnswerOutcome::Replied(answer) => Ok(Json(ChatResponse {
            reply: answer.reply,
            outcome: answer.outcome.to_string(),
            sources: answer.sources,
            records: answer.records,
        })),
        AnswerOutcome::FormattingUnavailable {
            error,
            records,
            sources,
        } => Err(formatting_unavailable(error, records, sources)),
    }
}

// ============ POST /index/rebuild ============

async fn handle_rebuild(State(state): State<AppState>) -> Result<Json<RebuildReport>, AppError> {
    let answerer = state.answerer.clone();
    let report = tokio::task::spawn_blocking(move || answerer.index().rebuild())
        .await
        .map_err(|e| internal(e.to_string()))?
        .map_err(|e| internal(format!("rebuild failed: {:#}", e)))?;
    Ok(Json(report))
}

// ============ POST /classify ============

#[derive(Deserialize)]
struct ClassifyRequest {
    text: String,
}

#[derive(Serialize)]
struct ClassifyResponse {
    route: Route,
    #[serde(flatten)]
    class: QueryClass,
}

async fn handle_classify(
    State(state): State<AppState>,
    Json(req): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, AppError> {
    if req.text.trim().is_empty() {
        return Err(bad_request("text must not be empty"));
    }
    let snapshot = state.answerer.index().snapshot();
    let class = classify(&req.text, &snapshot.index, state.answerer.index().lexicon());
    Ok(Json(ClassifyResponse {
        route: class.route(),
        class,
    }))
}
