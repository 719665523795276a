//! HTTP API over the query pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service banner with the endpoint list |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/api/v1/hackrx/run` | Answer questions about one document |
//! | `GET`  | `/api/v1/stats` | Cache and model statistics |
//! | `POST` | `/api/v1/cache/clear` | Drop every cached document |
//!
//! # Authentication
//!
//! `/api/v1/hackrx/run` requires `Authorization: Bearer <token>` matching the
//! environment variable named by `[server].api_key_env`. If that variable
//! is unset the endpoint answers 503.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "download_error", "message": "Failed to download document: HTTP 404" } }
//! ```
//!
//! Status codes: `bad_request` 400, `unauthorized` 401, `unsupported_format`
//! 415, `download_error` 502, `auth_not_configured` 503, anything else 500.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::RagError;
use crate::pipeline::{PipelineStats, QueryPipeline};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<QueryPipeline>,
    /// Expected bearer token; `None` disables the run endpoint.
    api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(pipeline: Arc<QueryPipeline>, api_key: Option<String>) -> Self {
        Self {
            pipeline,
            api_key: api_key.map(Arc::from),
        }
    }
}

/// Build the router. Exposed separately from [`run_server`] so tests can
/// serve it on an ephemeral port.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/api/v1/hackrx/run", post(handle_run))
        .route("/api/v1/stats", get(handle_stats))
        .route("/api/v1/cache/clear", post(handle_clear_cache))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Arc::new(QueryPipeline::from_config(config)?);

    let api_key = std::env::var(&config.server.api_key_env).ok();
    if api_key.is_none() {
        tracing::warn!(
            env = %config.server.api_key_env,
            "API key not set; /api/v1/hackrx/run will refuse requests"
        );
    }

    let app = router(AppState::new(pipeline, api_key));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let status = match err {
            RagError::Download(_) => StatusCode::BAD_GATEWAY,
            RagError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.code(), err.to_string())
    }
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let expected = state.api_key.as_deref().ok_or_else(|| {
        AppError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "auth_not_configured",
            "API key is not configured on the server",
        )
    })?;

    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match token {
        Some(t) if t == expected => Ok(()),
        Some(_) => Err(AppError::new(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "Invalid authentication token",
        )),
        None => Err(AppError::new(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "Missing bearer token",
        )),
    }
}

// ============ GET / ============

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "LLM-Powered Intelligent Query-Retrieval System is running",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "run": "POST /api/v1/hackrx/run",
            "health": "GET /health",
            "stats": "GET /api/v1/stats",
            "clear_cache": "POST /api/v1/cache/clear",
        }
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/v1/hackrx/run ============

#[derive(Deserialize)]
struct RunRequest {
    /// URL (or path) of the document to query.
    documents: String,
    questions: Vec<String>,
}

#[derive(Serialize)]
struct RunResponse {
    answers: Vec<String>,
}

/// Answers are positionally aligned with `questions`. Only document build
/// failures produce an error response.
async fn handle_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RunRequest>,
) -> Result<Json<RunResponse>, AppError> {
    authorize(&state, &headers)?;

    if req.documents.trim().is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "documents must not be empty",
        ));
    }

    tracing::info!(
        document = %req.documents,
        questions = req.questions.len(),
        "run request"
    );

    let answers = state
        .pipeline
        .process_queries(req.documents.trim(), &req.questions)
        .await?;

    Ok(Json(RunResponse { answers }))
}

// ============ GET /api/v1/stats ============

async fn handle_stats(State(state): State<AppState>) -> Json<PipelineStats> {
    Json(state.pipeline.statistics())
}

// ============ POST /api/v1/cache/clear ============

async fn handle_clear_cache(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.pipeline.clear_cache();
    Json(serde_json::json!({ "message": "Document cache cleared" }))
}
