//! Read-only HTTP API over the materialized data.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/publications/{code}` | Publication title, code, and cached tree snapshot |
//! | `GET`  | `/nodes/{id}` | One tree node with its normalized display record |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses use a single JSON shape:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "publication not found: X" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; the tree widget is
//! served from a different origin than this API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::db;
use crate::tree_cmd::{fetch_node, fetch_publication};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    pool: Arc<SqlitePool>,
}

/// Starts the read API server. Binds to `[server].bind` and runs until
/// the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pool = db::connect(config).await?;

    let state = AppState {
        pool: Arc::new(pool),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/publications/{code}", get(handle_publication))
        .route("/nodes/{id}", get(handle_node))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("read API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
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

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
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

// ============ GET /publications/{code} ============

async fn handle_publication(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if code.trim().is_empty() {
        return Err(bad_request("publication code must not be empty"));
    }

    let publication = fetch_publication(&state.pool, &code)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found(format!("publication not found: {}", code)))?;

    Ok(Json(serde_json::json!({
        "title": publication.title,
        "code": publication.code,
        "structure_json": publication.structure_json,
    })))
}

// ============ GET /nodes/{id} ============

async fn handle_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id: i64 = id
        .parse()
        .map_err(|_| bad_request(format!("invalid node id: {}", id)))?;

    let node = fetch_node(&state.pool, id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found(format!("node not found: {}", id)))?;

    Ok(Json(serde_json::json!({
        "id": node.id,
        "technical_name": node.technical_name,
        "title": node.title,
        "issue_number": node.issue_number,
        "content_json": node.content_json,
        "is_category": node.is_category,
    })))
}
