//! Route handler functions for all API endpoints.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use sema_core::types::Document;
use sema_rag::RagAnswer;

use crate::error::ApiError;
use crate::state::AppState;

/// Default number of documents retrieved per query.
pub const DEFAULT_TOP_K: usize = 5;
/// Upper bound applied to requested `top_k`.
pub const MAX_TOP_K: usize = 100;

// =============================================================================
// Root and health
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
}

/// GET / - liveness banner.
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Semantic Engine API running".to_string(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub documents: u64,
    pub backend: String,
    pub completer: String,
    pub uptime_secs: u64,
    pub queries_served: u64,
    pub mean_query_latency_ms: f64,
}

/// GET /health - index size, backend and query counters.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let index = state.retriever.index();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        documents: index.len() as u64,
        backend: index.backend().to_string(),
        completer: state.pipeline.completer().name().to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        queries_served: state.metrics.served(),
        mean_query_latency_ms: state.metrics.mean_latency_ms(),
    })
}

// =============================================================================
// Query
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

/// POST /query - answer a question from the nearest indexed documents.
pub async fn query(
    State(state): State<AppState>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<RagAnswer>, ApiError> {
    if body.query.trim().is_empty() {
        return Err(ApiError::BadRequest("'query' must not be empty".to_string()));
    }
    let top_k = body.top_k.clamp(1, MAX_TOP_K);

    let start = Instant::now();
    let answer = state.pipeline.answer(&body.query, top_k).await?;
    let elapsed = start.elapsed();
    state.metrics.record(elapsed);

    info!(
        top_k,
        retrieved = answer.retrieved.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Query served"
    );
    Ok(Json(answer))
}

// =============================================================================
// Ingest and persistence
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub documents: Vec<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub indexed: usize,
    pub total: usize,
}

/// POST /ingest - embed and index a batch of documents.
///
/// The batch is validated as a whole; one invalid document rejects it.
pub async fn ingest(
    State(state): State<AppState>,
    Json(body): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    if body.documents.is_empty() {
        return Err(ApiError::BadRequest(
            "'documents' must not be empty".to_string(),
        ));
    }

    let docs = body
        .documents
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            Document::from_json(value, &format!("doc-{}", Uuid::new_v4().simple()))
                .map_err(|e| ApiError::BadRequest(format!("documents[{}]: {}", i, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let indexed = state.retriever.index_documents(docs).await?;
    Ok(Json(IngestResponse {
        indexed,
        total: state.retriever.index().len(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveResponse {
    pub path: String,
    pub documents: usize,
}

/// POST /index/save - persist the index to the configured path.
pub async fn save_index(State(state): State<AppState>) -> Result<Json<SaveResponse>, ApiError> {
    let index = Arc::clone(state.retriever.index());
    let path = state.index_path.clone();

    let documents = tokio::task::spawn_blocking(move || {
        index.save(&path)?;
        Ok::<_, ApiError>(index.len())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Save task failed: {}", e)))??;

    Ok(Json(SaveResponse {
        path: state.index_path.display().to_string(),
        documents,
    }))
}
