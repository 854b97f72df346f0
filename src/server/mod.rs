//! HTTP surface: chat submission, SSE streaming, conversation listing,
//! document ingestion, and health.
//!
//! Handlers stay thin; every domain decision lives in the orchestrator,
//! ingestion pipeline, or store. Validation failures return 400 with no side
//! effects, missing resources 404, and dependency failures on synchronous
//! paths 500. Failures inside a spawned orchestration never surface here;
//! they become `error` events on the conversation channel.

mod chat;
mod conversations;
mod health;
mod ingest;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::config::Settings;
use crate::embeddings::Embedder;
use crate::event_bus::ConversationHub;
use crate::ingestion::JobQueue;
use crate::llm::ChatModel;
use crate::orchestrator::Orchestrator;
use crate::store::{SqliteStore, StoreError};
use crate::vector::VectorIndex;

/// Shared handler state; everything inside is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteStore>,
    pub hub: Arc<ConversationHub>,
    pub queue: JobQueue,
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub model: Arc<dyn ChatModel>,
    pub orchestrator: Arc<Orchestrator>,
    pub settings: Arc<Settings>,
}

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat::submit))
        .route("/chat/{conversation_id}/stream", get(chat::stream))
        .route("/conversations", get(conversations::list))
        .route(
            "/conversations/{conversation_id}/history",
            get(conversations::history),
        )
        .route("/ingest-url", post(ingest::ingest_url))
        .route("/upload", post(ingest::upload))
        .route("/documents/{doc_id}/pdf", get(ingest::document_pdf))
        .route("/health", get(health::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler-level error, rendered as `{"detail": ...}` JSON.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::BadRequest(detail.into())
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::NotFound(detail.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<crate::ingestion::QueueError> for ApiError {
    fn from(err: crate::ingestion::QueueError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, detail)
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
