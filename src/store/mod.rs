//! Relational persistence for conversations, messages, and document records.
//!
//! Chunks never touch this store; they live only in the vector index. The
//! store's concurrency story is SQLite's own (atomic statements through one
//! pool), with no extra coordination in this layer.

pub mod sqlite;

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use sqlite::SqliteStore;

/// Errors from the relational store.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("database error: {0}")]
    #[diagnostic(code(ragline::store::database))]
    Database(#[from] sqlx::Error),

    #[error("invalid stored metadata: {0}")]
    #[diagnostic(code(ragline::store::metadata))]
    Metadata(#[from] serde_json::Error),

    #[error("unknown document status: {0}")]
    #[diagnostic(code(ragline::store::status))]
    UnknownStatus(String),
}

/// Document ingestion lifecycle.
///
/// Moves `pending → queued → processing → completed`, or to `failed` from
/// any working state. Duplicate submissions short-circuit on anything that
/// is already queued or beyond.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
}

impl DocStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocStatus::Pending => "pending",
            DocStatus::Queued => "queued",
            DocStatus::Processing => "processing",
            DocStatus::Completed => "completed",
            DocStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        match raw {
            "pending" => Ok(DocStatus::Pending),
            "queued" => Ok(DocStatus::Queued),
            "processing" => Ok(DocStatus::Processing),
            "completed" => Ok(DocStatus::Completed),
            "failed" => Ok(DocStatus::Failed),
            other => Err(StoreError::UnknownStatus(other.to_string())),
        }
    }

    /// True when a duplicate submission should reuse this document instead
    /// of enqueueing new work.
    pub fn is_in_flight_or_done(&self) -> bool {
        matches!(
            self,
            DocStatus::Queued | DocStatus::Processing | DocStatus::Completed
        )
    }
}

impl std::fmt::Display for DocStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub conversation_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// One persisted chat message; history order is creation order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_id: String,
    pub conversation_id: String,
    pub role: String,
    pub content: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A tracked source document and its ingestion status.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub doc_id: String,
    /// Source locator: a remote URL or a `file://` URI for uploads.
    pub url: String,
    /// Source kind, e.g. `web` or `upload`.
    pub source: String,
    pub status: DocStatus,
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
}
