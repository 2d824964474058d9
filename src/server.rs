//! JSON HTTP server exposing ingestion and related-section queries.
//!
//! A thin layer over the library: handlers validate input, call the
//! pipeline, and serialize its results. No retrieval logic lives here.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/ingest` | Multipart PDF upload; per-file outcome report |
//! | `POST` | `/api/related-sections` | `{"query_text"}` → ranked related sections |
//! | `GET`  | `/health` | Version and indexed chunk count |
//!
//! # Error Contract
//!
//! All error responses share one shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query text must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `embedding_unavailable` (502),
//! `index_corrupt` (500), `internal` (500). A failed search is always an
//! error response, so callers can tell "no matches" (200 with `[]`)
//! from "search failed".
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser-based
//! viewer can call the API directly.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::embedding::{create_provider, EmbedError, EmbeddingProvider};
use crate::index::{IndexError, VectorIndex};
use crate::ingest::ingest_batch;
use crate::models::{IngestReport, RelatedSection};
use crate::retrieve::retrieve;

/// Shared application state: configuration, the vector index, and the
/// embedding provider, all constructed once at startup.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    index: Arc<VectorIndex>,
    provider: Arc<dyn EmbeddingProvider>,
}

/// Start the HTTP server on the configured bind address.
///
/// Loads (or creates) the persisted index and constructs the embedding
/// provider before binding, so a corrupt index or misconfigured model
/// fails fast instead of at the first request.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let provider: Arc<dyn EmbeddingProvider> = Arc::from(create_provider(&config.embedding)?);
    let index = Arc::new(VectorIndex::open_or_create(
        &config.index.dir,
        provider.model_name(),
        provider.dims(),
    )?);

    tracing::info!(
        entries = index.len(),
        model = provider.model_name(),
        "index loaded"
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        index,
        provider,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/ingest", post(handle_ingest))
        .route("/api/related-sections", post(handle_related_sections))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    let bind_addr = &config.server.bind;
    tracing::info!("listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Handlers ============

#[derive(Deserialize)]
struct QueryRequest {
    query_text: String,
}

async fn handle_related_sections(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<Vec<RelatedSection>>, AppError> {
    if request.query_text.trim().is_empty() {
        return Err(bad_request("query_text must not be empty"));
    }

    let results = retrieve(
        &state.index,
        state.provider.as_ref(),
        &state.config.retrieval,
        &request.query_text,
        state.config.retrieval.top_n,
        &CancelToken::new(),
    )
    .await
    .map_err(classify_error)?;

    Ok(Json(results))
}

async fn handle_ingest(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestReport>, AppError> {
    let mut documents: Vec<(String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart payload: {}", e)))?
    {
        let doc_name = field
            .file_name()
            .map(|s| s.to_string())
            .or_else(|| field.name().map(|s| s.to_string()))
            .unwrap_or_else(|| "unnamed.pdf".to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload '{}': {}", doc_name, e)))?;
        documents.push((doc_name, bytes.to_vec()));
    }

    if documents.is_empty() {
        return Err(bad_request("no files in upload"));
    }

    let report = ingest_batch(
        &state.index,
        state.provider.as_ref(),
        &state.config.chunking,
        &state.config.index.dir,
        documents,
        &CancelToken::new(),
    )
    .await
    .map_err(classify_error)?;

    Ok(Json(report))
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
    indexed_chunks: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        indexed_chunks: state.index.len(),
    })
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
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

/// Map pipeline failures onto HTTP status codes by the typed error at
/// the root of the chain.
fn classify_error(err: anyhow::Error) -> AppError {
    if err.downcast_ref::<EmbedError>().is_some() {
        return AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "embedding_unavailable".to_string(),
            message: err.to_string(),
        };
    }

    if let Some(index_err) = err.downcast_ref::<IndexError>() {
        let code = match index_err {
            IndexError::Corrupt(_) => "index_corrupt",
            _ => "internal",
        };
        return AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: code.to_string(),
            message: err.to_string(),
        };
    }

    if err.to_string().contains("must not be empty") {
        return bad_request(err.to_string());
    }

    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: err.to_string(),
    }
}
