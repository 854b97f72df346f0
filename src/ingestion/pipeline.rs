use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::embeddings::Embedder;
use crate::store::{DocStatus, SqliteStore};
use crate::vector::{VectorIndex, VectorPoint};

use super::extract::{
    chunk_page, chunk_words, extract_main_text, extract_pdf_pages, fetch_url,
};
use super::{IngestError, IngestJob, JobSource};

/// One embeddable chunk with its index payload.
struct PreparedChunk {
    text: String,
    payload: serde_json::Value,
    /// Page the chunk came from, 0 for non-paged sources.
    page: u64,
    /// Position within its page (or the whole document for URLs).
    index: usize,
}

/// Processes queued ingestion jobs: extract, chunk, embed, upsert.
///
/// Workers share one pipeline via `Arc`; each runs [`IngestionPipeline::work`]
/// against a cloned queue receiver, so a job is handled by exactly one worker.
pub struct IngestionPipeline {
    store: Arc<SqliteStore>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    chunking: ChunkingConfig,
    client: reqwest::Client,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<SqliteStore>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            index,
            chunking,
            client: reqwest::Client::new(),
        }
    }

    /// Worker loop: pull jobs until every sender is gone.
    pub async fn work(self: Arc<Self>, receiver: flume::Receiver<IngestJob>) {
        while let Ok(job) = receiver.recv_async().await {
            let job_id = job.job_id;
            let doc_id = job.doc_id.clone();
            tracing::info!(%job_id, %doc_id, "ingestion job started");

            match self.process(&job).await {
                Ok(chunks) => {
                    tracing::info!(%job_id, %doc_id, chunks, "ingestion job completed");
                }
                Err(err) => {
                    tracing::error!(%job_id, %doc_id, error = %err, "ingestion job failed");
                    if let Err(err) = self
                        .store
                        .set_document_status(&doc_id, DocStatus::Failed)
                        .await
                    {
                        tracing::error!(%doc_id, error = %err, "failed to record failed status");
                    }
                }
            }
        }
        tracing::debug!("ingestion worker exiting; queue closed");
    }

    /// Run one job to completion. Returns the number of chunks indexed.
    async fn process(&self, job: &IngestJob) -> Result<usize, IngestError> {
        self.store
            .set_document_status(&job.doc_id, DocStatus::Processing)
            .await?;

        let chunks = match &job.source {
            JobSource::Url(url) => self.prepare_url(&job.doc_id, url).await?,
            JobSource::File(path) => self.prepare_pdf(&job.doc_id, path).await?,
        };

        let indexed = if chunks.is_empty() {
            tracing::warn!(doc_id = %job.doc_id, "document produced no chunks");
            0
        } else {
            self.index_chunks(&job.doc_id, chunks).await?
        };

        self.store
            .set_document_status(&job.doc_id, DocStatus::Completed)
            .await?;
        Ok(indexed)
    }

    async fn prepare_url(&self, doc_id: &str, url: &str) -> Result<Vec<PreparedChunk>, IngestError> {
        let html = fetch_url(&self.client, url).await?;
        let text = extract_main_text(&html);
        let chunks = chunk_words(&text, self.chunking.word_window, self.chunking.word_overlap)
            .into_iter()
            .enumerate()
            .map(|(index, text)| PreparedChunk {
                payload: json!({ "doc_id": doc_id, "text": text }),
                text,
                page: 0,
                index,
            })
            .collect();
        Ok(chunks)
    }

    async fn prepare_pdf(
        &self,
        doc_id: &str,
        path: &std::path::Path,
    ) -> Result<Vec<PreparedChunk>, IngestError> {
        let bytes = tokio::fs::read(path).await?;
        let pages = extract_pdf_pages(&bytes)?;

        let mut chunks = Vec::new();
        for (page_index, page_text) in pages.iter().enumerate() {
            let page_number = page_index as u64 + 1;
            for (index, chunk) in chunk_page(
                page_text,
                self.chunking.page_window_chars,
                self.chunking.page_overlap_chars,
            )
            .into_iter()
            .enumerate()
            {
                chunks.push(PreparedChunk {
                    payload: json!({
                        "doc_id": doc_id,
                        "text": chunk.text,
                        "page_number": page_number,
                        "start_offset": chunk.start_offset,
                        "end_offset": chunk.end_offset,
                    }),
                    text: chunk.text,
                    page: page_number,
                    index,
                });
            }
        }
        Ok(chunks)
    }

    async fn index_chunks(
        &self,
        doc_id: &str,
        chunks: Vec<PreparedChunk>,
    ) -> Result<usize, IngestError> {
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let points: Vec<VectorPoint> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorPoint {
                id: point_id(doc_id, chunk.page, chunk.index),
                vector,
                payload: chunk.payload,
            })
            .collect();

        let count = points.len();
        self.index.upsert(points).await?;
        Ok(count)
    }
}

/// Deterministic point id so re-ingesting a document overwrites its old
/// points instead of duplicating them.
pub fn point_id(doc_id: &str, page: u64, index: usize) -> Uuid {
    let name = format!("{doc_id}:{page}:{index}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_ids_are_stable_across_runs() {
        let a = point_id("doc-1", 2, 3);
        let b = point_id("doc-1", 2, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn point_ids_differ_per_chunk() {
        let base = point_id("doc-1", 1, 0);
        assert_ne!(base, point_id("doc-1", 1, 1));
        assert_ne!(base, point_id("doc-1", 2, 0));
        assert_ne!(base, point_id("doc-2", 1, 0));
    }
}
