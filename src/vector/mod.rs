//! Vector index capability: upsert chunk vectors, query nearest neighbors.
//!
//! The orchestrator and the ingestion pipeline only ever see the
//! [`VectorIndex`] trait; the HTTP adapter in [`qdrant`] is one
//! implementation, and tests substitute in-memory fakes.

pub mod qdrant;

use async_trait::async_trait;
use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub use qdrant::QdrantIndex;

/// One chunk vector with its payload, ready for upsert.
#[derive(Clone, Debug)]
pub struct VectorPoint {
    /// Deterministic point id; re-upserting the same id overwrites in place.
    pub id: Uuid,
    pub vector: Vec<f32>,
    /// Payload stored alongside the vector:
    /// `{doc_id, page_number?, start_offset?, end_offset?, text}`.
    pub payload: Value,
}

/// One scored retrieval hit, normalized from whatever the index returned.
#[derive(Clone, Debug)]
pub struct ScoredHit {
    pub payload: Value,
    pub score: f32,
}

/// Errors from the vector index adapter.
///
/// Result-shape mismatches are NOT errors; they degrade to zero hits inside
/// [`normalize_hits`] so the orchestrator stays shape-agnostic.
#[derive(Debug, Error, Diagnostic)]
pub enum VectorIndexError {
    #[error("vector index transport error: {0}")]
    #[diagnostic(code(ragline::vector::transport))]
    Transport(String),

    #[error("vector index rejected request ({status}): {body}")]
    #[diagnostic(code(ragline::vector::rejected))]
    Rejected { status: u16, body: String },
}

impl From<reqwest::Error> for VectorIndexError {
    fn from(err: reqwest::Error) -> Self {
        VectorIndexError::Transport(err.to_string())
    }
}

/// Capability interface over a similarity index.
///
/// Implementations must be safe for concurrent use; the orchestrator and all
/// ingestion workers share one instance by reference.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the backing collection if it does not exist yet.
    async fn ensure_ready(&self) -> Result<(), VectorIndexError>;

    /// Insert or overwrite points by id.
    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<(), VectorIndexError>;

    /// Return the `top_k` nearest hits with payloads, best first.
    async fn query(&self, vector: &[f32], top_k: usize)
        -> Result<Vec<ScoredHit>, VectorIndexError>;

    /// Cheap reachability probe for the health endpoint.
    async fn healthy(&self) -> bool;
}

/// Normalize a query response body into scored hits.
///
/// Index clients have returned differently shaped envelopes across versions,
/// so recognition is an explicit ordered list:
///
/// 1. `{"result": {"points": [...]}}`
/// 2. `{"result": [...]}`
/// 3. `{"points": [...]}`
/// 4. `{"hits": [...]}`
/// 5. a bare array of hits
///
/// Entries without an object `payload` are skipped; a missing `score` reads
/// as `0.0`. An unrecognized envelope yields zero hits rather than an error.
pub fn normalize_hits(body: &Value) -> Vec<ScoredHit> {
    let entries = body
        .get("result")
        .and_then(|result| result.get("points"))
        .and_then(Value::as_array)
        .or_else(|| body.get("result").and_then(Value::as_array))
        .or_else(|| body.get("points").and_then(Value::as_array))
        .or_else(|| body.get("hits").and_then(Value::as_array))
        .or_else(|| body.as_array());

    let Some(entries) = entries else {
        tracing::warn!(
            keys = ?body.as_object().map(|map| map.keys().collect::<Vec<_>>()),
            "unrecognized vector query result shape; treating as zero hits"
        );
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let payload = entry.get("payload")?;
            if !payload.is_object() {
                return None;
            }
            let score = entry.get("score").and_then(Value::as_f64).unwrap_or(0.0) as f32;
            Some(ScoredHit {
                payload: payload.clone(),
                score,
            })
        })
        .collect()
}
