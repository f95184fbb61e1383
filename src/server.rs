//! HTTP server.
//!
//! Exposes the resolver as a small JSON API for the chat frontend.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Resolve a question (with optional prior turns) |
//! | `GET`  | `/categories` | Knowledge base categories and load failures |
//! | `GET`  | `/health` | Version, knowledge load state, configured model |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! A malformed body (missing `question`, invalid JSON, wrong content type)
//! gets the same `bad_request` shape.
//!
//! Resolution itself never fails for a non-empty question: fallbacks are
//! returned as a normal `200` with the `source` field naming the tier.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser
//! frontend can call the API directly.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::knowledge::KnowledgeStats;
use crate::models::{ConversationTurn, ResolutionResult};
use crate::resolver::Resolver;

/// Starts the HTTP server on `[server].bind` and runs until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let resolver = Arc::new(Resolver::from_config(config)?);
    // load up front so the first request does not pay for it
    resolver.knowledge().ensure_loaded().await;

    let app = router(resolver);

    tracing::info!(bind = %config.server.bind, "server listening");
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router around a shared [`Resolver`].
pub fn router(resolver: Arc<Resolver>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(handle_ask))
        .route("/categories", get(handle_categories))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(resolver)
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

// ============ POST /ask ============

/// Request body for `POST /ask`.
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

async fn handle_ask(
    State(resolver): State<Arc<Resolver>>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<ResolutionResult>, AppError> {
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;
    let result = resolver
        .resolve(&req.question, &req.history)
        .await
        .map_err(|e| bad_request(e.to_string()))?;
    Ok(Json(result))
}

// ============ GET /categories ============

async fn handle_categories(State(resolver): State<Arc<Resolver>>) -> Json<KnowledgeStats> {
    Json(resolver.knowledge().stats().await)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    knowledge: KnowledgeHealth,
    model: String,
}

#[derive(Serialize)]
struct KnowledgeHealth {
    loaded: bool,
    categories: usize,
    entries: usize,
}

/// Reports component state without triggering a knowledge load.
async fn handle_health(State(resolver): State<Arc<Resolver>>) -> Json<HealthResponse> {
    let kb = resolver.knowledge();
    let categories = kb.categories();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        knowledge: KnowledgeHealth {
            loaded: kb.is_loaded(),
            categories: categories.len(),
            entries: categories.iter().map(|c| c.entries.len()).sum(),
        },
        model: resolver.model_name().to_string(),
    })
}
