//! Document ingestion: job queue, extraction, chunking, and the worker
//! pipeline that populates the vector index.
//!
//! Jobs are consumed at-least-once; chunk point ids are derived
//! deterministically from `doc_id`, page, and chunk index so a reprocessed
//! job re-upserts the same points instead of duplicating them.

pub mod extract;
pub mod pipeline;

use std::path::PathBuf;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use pipeline::IngestionPipeline;

/// Where a job's raw bytes come from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobSource {
    /// Remote web page, fetched and HTML-stripped.
    Url(String),
    /// Local PDF file, extracted per page.
    File(PathBuf),
}

/// One queued ingestion work item.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestJob {
    pub job_id: Uuid,
    pub doc_id: String,
    pub source: JobSource,
}

impl IngestJob {
    pub fn url(doc_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            doc_id: doc_id.into(),
            source: JobSource::Url(url.into()),
        }
    }

    pub fn file(doc_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            doc_id: doc_id.into(),
            source: JobSource::File(path.into()),
        }
    }
}

/// Errors from queue operations.
#[derive(Debug, Error, Diagnostic)]
pub enum QueueError {
    #[error("ingestion queue disconnected")]
    #[diagnostic(
        code(ragline::ingestion::queue_disconnected),
        help("All workers have exited; the process is shutting down or crashed.")
    )]
    Disconnected,
}

/// Unbounded in-process job queue.
///
/// The narrow "enqueue ingestion job" interface the HTTP surface consumes;
/// workers hold cloned receivers and pull jobs concurrently, each job going
/// to exactly one worker.
#[derive(Clone, Debug)]
pub struct JobQueue {
    tx: flume::Sender<IngestJob>,
    rx: flume::Receiver<IngestJob>,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self { tx, rx }
    }

    pub fn enqueue(&self, job: IngestJob) -> Result<(), QueueError> {
        self.tx.send(job).map_err(|_| QueueError::Disconnected)
    }

    /// Receiver handle for a worker task.
    pub fn receiver(&self) -> flume::Receiver<IngestJob> {
        self.rx.clone()
    }

    /// Jobs currently waiting.
    pub fn depth(&self) -> usize {
        self.rx.len()
    }

    /// Health probe: false once every receiver has been dropped.
    pub fn is_connected(&self) -> bool {
        !self.tx.is_disconnected()
    }
}

/// Errors inside one job's processing.
#[derive(Debug, Error, Diagnostic)]
pub enum IngestError {
    #[error("fetch failed for {url}: {message}")]
    #[diagnostic(code(ragline::ingestion::fetch))]
    Fetch { url: String, message: String },

    #[error("pdf extraction failed: {0}")]
    #[diagnostic(code(ragline::ingestion::pdf))]
    Pdf(String),

    #[error("io error: {0}")]
    #[diagnostic(code(ragline::ingestion::io))]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(ragline::ingestion::embed))]
    Embed(#[from] crate::embeddings::EmbedError),

    #[error(transparent)]
    #[diagnostic(code(ragline::ingestion::index))]
    Index(#[from] crate::vector::VectorIndexError),

    #[error(transparent)]
    #[diagnostic(code(ragline::ingestion::store))]
    Store(#[from] crate::store::StoreError),
}
