//! JSON HTTP API.
//!
//! Exposes the fetch cache, the stored topics, and the ask pipeline to
//! browser or script clients. All handlers share one [`FetchCache`], so
//! concurrent `POST /fetch` calls for the same topic reach arXiv once.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/topics` | All topics with document counts |
//! | `GET`  | `/topics/{name}/documents` | Documents of one topic |
//! | `POST` | `/fetch` | Fetch a comma-separated topic list through the cache |
//! | `POST` | `/ask` | Answer a question from a topic's documents |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `provider_disabled` (400),
//! `not_found` (404), `internal` (500).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use paperdesk_core::embedding::Embedder;
use paperdesk_core::generation::TextGenerator;
use paperdesk_core::models::{Document, Topic};
use paperdesk_core::store::Store;

use crate::ask::{answer, AskOptions, AskOutcome, AskRequest};
use crate::cache::{CacheStats, FetchCache};
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::fetch::{
    arxiv_cache, check_count, fetch_interval, fetch_topics, split_topics, BatchReport,
    DEFAULT_COUNT,
};
use crate::generation::create_generator;
use crate::sqlite_store::SqliteStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub cache: Arc<FetchCache>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn TextGenerator>,
}

impl AppState {
    /// Production wiring: SQLite store, arXiv-backed cache, configured
    /// providers.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::connect(config).await?);
        let cache = arxiv_cache(config, store.clone())?;
        Ok(Self {
            config: Arc::new(config.clone()),
            store,
            cache: Arc::new(cache),
            embedder: create_embedder(&config.embedding)?,
            generator: create_generator(&config.generation)?,
        })
    }
}

/// Build the router with CORS open to every origin.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/topics", get(handle_topics))
        .route("/topics/{name}/documents", get(handle_documents))
        .route("/fetch", post(handle_fetch))
        .route("/ask", post(handle_ask))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on `[server].bind` and run until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config).await?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "server listening");
    println!("Paperdesk server listening on http://{}", config.server.bind);

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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

/// Map a pipeline error to a status. Validation and disabled-provider
/// errors are the caller's to fix; everything else is a 500.
fn classify_error(err: anyhow::Error) -> AppError {
    let message = format!("{:#}", err);
    if message.contains("disabled") {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "provider_disabled",
            message,
        }
    } else if message.contains("must not be empty") {
        bad_request(message)
    } else {
        tracing::error!(error = %message, "request failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message,
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    cache: CacheStats,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        cache: state.cache.stats(),
    })
}

// ============ GET /topics ============

#[derive(Serialize)]
struct TopicsResponse {
    topics: Vec<Topic>,
}

async fn handle_topics(State(state): State<AppState>) -> Result<Json<TopicsResponse>, AppError> {
    let topics = state.store.list_topics().await.map_err(classify_error)?;
    Ok(Json(TopicsResponse { topics }))
}

// ============ GET /topics/{name}/documents ============

#[derive(Serialize)]
struct DocumentsResponse {
    topic: Topic,
    documents: Vec<Document>,
}

async fn handle_documents(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DocumentsResponse>, AppError> {
    let topic = state
        .store
        .find_topic(&name)
        .await
        .map_err(classify_error)?
        .ok_or_else(|| not_found(format!("no topic matching: {}", name)))?;
    let documents = state
        .store
        .documents_by_topic(&topic.name)
        .await
        .map_err(classify_error)?;
    Ok(Json(DocumentsResponse { topic, documents }))
}

// ============ POST /fetch ============

#[derive(Deserialize)]
struct FetchBody {
    /// Comma-separated topic list.
    topics: String,
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    force: bool,
}

async fn handle_fetch(
    State(state): State<AppState>,
    Json(body): Json<FetchBody>,
) -> Result<Json<BatchReport>, AppError> {
    let topics = split_topics(&body.topics);
    if topics.is_empty() {
        return Err(bad_request("topics must not be empty"));
    }
    let count = check_count(body.count.unwrap_or(DEFAULT_COUNT))
        .map_err(|e| bad_request(e.to_string()))?;
    let interval = fetch_interval(&state.config, body.force);

    Ok(Json(
        fetch_topics(&state.cache, &topics, count, interval).await,
    ))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskBody {
    query: String,
    topic: String,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    max_length: Option<usize>,
    #[serde(default)]
    num_beams: Option<usize>,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(body): Json<AskBody>,
) -> Result<Json<AskOutcome>, AppError> {
    if body.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let request = AskRequest::from_config(
        &state.config,
        &body.query,
        &body.topic,
        AskOptions {
            top_k: body.top_k,
            model: body.model,
            max_length: body.max_length,
            num_beams: body.num_beams,
        },
    );

    let outcome = answer(
        state.store.as_ref(),
        state.embedder.as_ref(),
        state.generator.as_ref(),
        &request,
    )
    .await
    .map_err(classify_error)?;

    Ok(Json(outcome))
}
