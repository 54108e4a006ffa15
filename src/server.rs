//! HTTP server.
//!
//! Thin JSON/multipart surface over the ingestion, query and comparison
//! pipelines. Handlers only parse the request and map errors; all work
//! happens in the pipelines held by [`AppState`].
//!
//! # Endpoints
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | `POST` | `/ingest` | multipart, repeated `files` field | `{ "message": ... }` |
//! | `POST` | `/query` | `{ "query": "..." }` | `{ "response": ... }` |
//! | `POST` | `/compare` | `{ "fields": [...] }` | `{ "comparison": ... }` |
//! | `GET`  | `/health` | | `{ "status": "ok", "version": ... }` |
//!
//! # Error Contract
//!
//! Every error response is `{ "error": "<message>" }`. Missing inputs and
//! malformed JSON are `400`, uploads over `[server].max_upload_bytes` are
//! `413`, and everything else is `500`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::compare::ComparePipeline;
use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::RagError;
use crate::extract::PdfImageExtractor;
use crate::generation::{create_generator, GenerationProvider};
use crate::ingest::IngestPipeline;
use crate::models::UploadedFile;
use crate::query::{QueryEngine, QueryOptions};
use crate::store::VectorStore;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub ingest: Arc<IngestPipeline>,
    pub query: Arc<QueryEngine>,
    pub compare: Arc<ComparePipeline>,
}

impl AppState {
    /// Wire the pipelines to the providers named in `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::from(create_provider(&config.embedding)?);
        let generator: Arc<dyn GenerationProvider> =
            Arc::from(create_generator(&config.generation)?);
        let store = VectorStore::new(&config.storage.index_path);

        let ingest = IngestPipeline::new(
            Arc::new(PdfImageExtractor::new(config.extraction.clone())),
            embedder.clone(),
            store.clone(),
            &config.storage.upload_dir,
            config.embedding.batch_size,
        );
        let query = Arc::new(QueryEngine::new(
            embedder,
            generator,
            store,
            QueryOptions {
                top_k: config.retrieval.top_k,
                max_tokens: config.generation.max_tokens,
                temperature: config.generation.temperature,
            },
        ));

        Ok(Self {
            ingest: Arc::new(ingest),
            compare: Arc::new(ComparePipeline::new(query.clone())),
            query,
        })
    }
}

/// Build the router with CORS, request tracing and the upload size limit.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ingest", post(handle_ingest))
        .route("/query", post(handle_query))
        .route("/compare", post(handle_compare))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`.
///
/// Runs until the process is terminated, or returns an error if the
/// providers cannot be built or binding fails.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        bind = %config.server.bind,
        max_upload_bytes = config.server.max_upload_bytes,
        "server listening"
    );
    serve(listener, state, config.server.max_upload_bytes).await
}

/// Serve on an already-bound listener.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    max_upload_bytes: usize,
) -> anyhow::Result<()> {
    axum::serve(listener, router(state, max_upload_bytes)).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(rag) = err.downcast_ref::<RagError>() {
            if rag.is_validation() {
                return bad_request(rag.to_string());
            }
        }
        tracing::error!(error = %format!("{:#}", err), "request failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{:#}", err),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
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

// ============ POST /ingest ============

#[derive(Serialize)]
struct IngestResponse {
    message: String,
}

/// Collects every `files` part; a request that is not multipart at all is
/// treated as carrying no files.
async fn handle_ingest(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<IngestResponse>, AppError> {
    let mut multipart = multipart.map_err(|_| bad_request(RagError::NoFiles.to_string()))?;

    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("files") {
            continue;
        }
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        let bytes = field.bytes().await?;
        files.push(UploadedFile {
            name,
            bytes: bytes.to_vec(),
        });
    }

    let outcome = state.ingest.ingest(files).await?;
    Ok(Json(IngestResponse {
        message: outcome.message().to_string(),
    }))
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    query: Option<String>,
}

#[derive(Serialize)]
struct QueryResponse {
    response: String,
}

async fn handle_query(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let Json(req) = body?;
    let query = req.query.unwrap_or_default();
    let response = state.query.answer(&query).await?;
    Ok(Json(QueryResponse { response }))
}

// ============ POST /compare ============

#[derive(Deserialize)]
struct CompareRequest {
    #[serde(default)]
    fields: Option<Vec<String>>,
}

#[derive(Serialize)]
struct CompareResponse {
    comparison: String,
}

async fn handle_compare(
    State(state): State<AppState>,
    body: Result<Json<CompareRequest>, JsonRejection>,
) -> Result<Json<CompareResponse>, AppError> {
    let Json(req) = body?;
    let fields = req.fields.unwrap_or_default();
    let comparison = state.compare.compare(&fields).await?;
    Ok(Json(CompareResponse { comparison }))
}
