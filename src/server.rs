//! HTTP API server.
//!
//! Thin JSON handlers over [`RagService`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/process-repo` | Clone and index a GitHub repository |
//! | `POST` | `/chat` | Ask a question about an indexed repository |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `no_content` (400), `conflict` (409),
//! `generation_failed` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front ends
//! can call the API directly.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::error::RagError;
use crate::models::{IngestReport, RagResult};
use crate::service::RagService;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    service: Arc<RagService>,
    /// Access token forwarded to `git clone` for private repositories.
    github_token: Option<String>,
}

/// Starts the HTTP server on `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = Arc::new(RagService::from_config(config).await?);
    let github_token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());

    let app = router(service, github_token);

    info!(bind = %config.server.bind, "server listening");
    println!("Server listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router; exposed so tests can drive it without a socket.
pub fn router(service: Arc<RagService>, github_token: Option<String>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/process-repo", post(handle_process_repo))
        .route("/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState {
            service,
            github_token,
        })
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
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let (status, code) = match &err {
            RagError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            RagError::NoIngestibleContent { .. } => (StatusCode::BAD_REQUEST, "no_content"),
            RagError::IngestInProgress { .. } => (StatusCode::CONFLICT, "conflict"),
            RagError::Generation { .. } => (StatusCode::BAD_GATEWAY, "generation_failed"),
            RagError::Embedding { .. }
            | RagError::Store { .. }
            | RagError::Source(_)
            | RagError::Tokenizer(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        let message = match &err {
            RagError::NoIngestibleContent { .. } => "No supported code files found".to_string(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            error!(code, error = %err, "request failed");
        }
        AppError {
            status,
            code,
            message,
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /process-repo ============

#[derive(Deserialize)]
struct ProcessRepoRequest {
    #[serde(default, alias = "githubUrl")]
    github_url: String,
}

/// Response body for `POST /process-repo`.
#[derive(Serialize)]
struct ProcessRepoResponse {
    status: &'static str,
    repo_id: String,
    total_chunks: usize,
}

impl From<IngestReport> for ProcessRepoResponse {
    fn from(report: IngestReport) -> Self {
        Self {
            status: report.status,
            repo_id: report.repository_id,
            total_chunks: report.total_chunks,
        }
    }
}

async fn handle_process_repo(
    State(state): State<AppState>,
    Json(req): Json<ProcessRepoRequest>,
) -> Result<Json<ProcessRepoResponse>, AppError> {
    if req.github_url.trim().is_empty() {
        return Err(RagError::InvalidInput("Missing github_url".into()).into());
    }
    let report = state
        .service
        .ingest_url(req.github_url.trim(), state.github_token.clone())
        .await?;
    Ok(Json(report.into()))
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    repo_id: String,
    #[serde(default)]
    question: String,
    #[serde(default)]
    variant: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<RagResult>, AppError> {
    if req.variant.is_empty() {
        return Err(RagError::InvalidInput("Missing repo_id, question, or variant".into()).into());
    }
    let result = state
        .service
        .ask(&req.repo_id, &req.question, &req.variant)
        .await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let e: AppError = RagError::InvalidInput("x".into()).into();
        assert_eq!((e.status, e.code), (StatusCode::BAD_REQUEST, "bad_request"));

        let e: AppError = RagError::NoIngestibleContent {
            repository_id: "r".into(),
        }
        .into();
        assert_eq!((e.status, e.code), (StatusCode::BAD_REQUEST, "no_content"));
        assert_eq!(e.message, "No supported code files found");

        let e: AppError = RagError::IngestInProgress {
            repository_id: "r".into(),
        }
        .into();
        assert_eq!(e.status, StatusCode::CONFLICT);

        let e: AppError = RagError::Generation {
            message: "503".into(),
        }
        .into();
        assert_eq!((e.status, e.code), (StatusCode::BAD_GATEWAY, "generation_failed"));

        let e: AppError = RagError::Source(anyhow::anyhow!("clone failed")).into();
        assert_eq!((e.status, e.code), (StatusCode::INTERNAL_SERVER_ERROR, "internal"));
    }

    #[test]
    fn test_process_repo_response_shape() {
        let body = ProcessRepoResponse::from(IngestReport {
            status: "success",
            repository_id: "abc".into(),
            total_chunks: 7,
            files_seen: 3,
            files_skipped: 0,
            zero_vector_chunks: 0,
        });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "status": "success", "repo_id": "abc", "total_chunks": 7 })
        );
    }
}
