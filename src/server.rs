//! HTTP API for the news chat backend.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/retrieval` | Retrieve articles for a one-off query |
//! | `POST` | `/api/completion` | Full RAG answer for a chat transcript |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Both API endpoints require the `x-api-key` header to match the shared
//! secret from the `NEWSDESK_API_KEY` environment variable; a missing or
//! wrong key gets `401` and no chat-log write.
//!
//! # Error Contract
//!
//! Error responses use a JSON envelope:
//!
//! ```json
//! { "error": { "code": "index_unavailable", "message": "..." } }
//! ```
//!
//! Codes: `unauthorized` (401), `index_unavailable` (500),
//! `generation_failed` (500), `internal` (500). The message carries the
//! full error chain so operators can diagnose from the response alone.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! chat frontends.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::chatlog::ChatLog;
use crate::config::{self, Config};
use crate::db;
use crate::embedding::{Embedder, RemoteEmbedder};
use crate::error::PipelineError;
use crate::generate::ResponseGenerator;
use crate::index::{SqliteIndex, VectorIndex};
use crate::intent::IntentExtractor;
use crate::llm::{create_chat_model, ChatModel};
use crate::migrate;
use crate::models::{last_user_message, ChatMessage, NewsArticle};
use crate::retrieve::Retriever;

/// Shared application state passed to all route handlers via Axum's
/// `State` extractor. Pipeline dependencies are injected at construction
/// (opened at process start) so tests can substitute doubles.
#[derive(Clone)]
pub struct AppState {
    pub retriever: Arc<Retriever>,
    pub generator: Arc<ResponseGenerator>,
    pub chatlog: Arc<ChatLog>,
    pub api_key: Arc<String>,
}

impl AppState {
    /// Wires the pipeline from injected capabilities. Used by [`run_server`]
    /// with production backends and by tests with doubles.
    pub fn new(
        index: Arc<dyn VectorIndex>,
        model: Arc<dyn ChatModel>,
        chatlog: ChatLog,
        api_key: String,
        top_k: usize,
    ) -> Self {
        Self {
            retriever: Arc::new(Retriever::new(
                IntentExtractor::new(model.clone()),
                index,
                top_k,
            )),
            generator: Arc::new(ResponseGenerator::new(model)),
            chatlog: Arc::new(chatlog),
            api_key: Arc::new(api_key),
        }
    }
}

/// Starts the HTTP server with the production SQLite index and the
/// configured chat model. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let api_key = config::api_key_from_env()?;

    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;

    let embedder: Arc<dyn Embedder> = Arc::new(RemoteEmbedder::new(config.embedding.clone()));
    let index: Arc<dyn VectorIndex> = Arc::new(SqliteIndex::new(pool, embedder));
    let model: Arc<dyn ChatModel> = Arc::from(create_chat_model(&config.llm)?);

    let total = index.count().await?;
    tracing::info!(articles = total, "article index ready");

    let state = AppState::new(
        index,
        model,
        ChatLog::new(config.logs.dir.clone()),
        api_key,
        config.retrieval.top_k,
    );

    let app = build_router(state);

    tracing::info!(bind = %config.server.bind, "news API listening");
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the router with CORS; separated from [`run_server`] so tests can
/// drive it in-process.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/retrieval", post(handle_retrieval))
        .route("/api/completion", post(handle_completion))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"index_unavailable"`).
    code: String,
    /// Human-readable error message with the full error chain.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
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

fn unauthorized() -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: "Invalid API Key".to_string(),
    }
}

/// Maps pipeline failures onto the error contract. Both cases are 500s —
/// the distinction is carried in the code and message.
fn pipeline_error(err: &PipelineError) -> AppError {
    let code = match err {
        PipelineError::Index(_) => "index_unavailable",
        PipelineError::Generation(_) => "generation_failed",
    };
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: code.to_string(),
        message: err.to_string(),
    }
}

/// Verifies the `x-api-key` header against the shared secret.
fn check_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let presented = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if presented != state.api_key.as_str() {
        return Err(unauthorized());
    }
    Ok(())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Handler for `GET /health`. Unauthenticated; used by monitors.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/retrieval ============

#[derive(Deserialize)]
struct RetrievalRequest {
    query: String,
}

#[derive(Serialize)]
struct RetrievalResponse {
    articles: Vec<NewsArticle>,
}

/// Handler for `POST /api/retrieval`.
///
/// Runs the full retrieval pipeline (intent extraction included) over a
/// single-user-message transcript built from the query string.
async fn handle_retrieval(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RetrievalRequest>,
) -> Result<Json<RetrievalResponse>, AppError> {
    check_api_key(&state, &headers)?;

    let transcript = vec![ChatMessage::user(request.query.clone())];
    match state.retriever.retrieve(&transcript).await {
        Ok(articles) => Ok(Json(RetrievalResponse { articles })),
        Err(e) => {
            log_failure(&state, &request.query, &e);
            Err(pipeline_error(&e))
        }
    }
}

// ============ POST /api/completion ============

#[derive(Deserialize)]
struct CompletionRequest {
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct CompletionResponse {
    response: String,
}

/// Handler for `POST /api/completion`.
///
/// Retrieval then grounded generation over the submitted transcript;
/// successful question/answer pairs land in the daily chat log.
async fn handle_completion(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CompletionRequest>,
) -> Result<Json<CompletionResponse>, AppError> {
    check_api_key(&state, &headers)?;

    let question = last_user_message(&request.messages)
        .unwrap_or_default()
        .to_string();

    let articles = match state.retriever.retrieve(&request.messages).await {
        Ok(articles) => articles,
        Err(e) => {
            log_failure(&state, &question, &e);
            return Err(pipeline_error(&e));
        }
    };

    match state.generator.generate(&request.messages, &articles).await {
        Ok(answer) => {
            if let Err(e) = state.chatlog.record(&question, &answer) {
                tracing::error!(error = %format!("{e:#}"), "failed to append chat log");
            }
            Ok(Json(CompletionResponse { response: answer }))
        }
        Err(e) => {
            log_failure(&state, &question, &e);
            Err(pipeline_error(&e))
        }
    }
}

/// Records a failed request in the chat log. Log-write failures are only
/// traced — they must not mask the original error.
fn log_failure(state: &AppState, question: &str, err: &PipelineError) {
    tracing::error!(error = %err, "pipeline request failed");
    if let Err(e) = state.chatlog.record_error(question, &err.to_string()) {
        tracing::error!(error = %format!("{e:#}"), "failed to append chat log");
    }
}
