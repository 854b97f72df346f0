//! Shared fakes for integration tests: deterministic adapters that stand in
//! for the embedding service, the vector index, and the chat model.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use ragline::embeddings::{EmbedError, Embedder};
use ragline::event_bus::{ChatEvent, ConversationHub, EventStream};
use ragline::llm::{ChatModel, LlmError, TokenStream};
use ragline::message::Message;
use ragline::vector::{ScoredHit, VectorIndex, VectorIndexError, VectorPoint};

/// Embedder returning a fixed-dimension vector derived from text length.
pub struct FakeEmbedder {
    pub dim: usize,
    pub fail: bool,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, fail: false }
    }

    pub fn failing() -> Self {
        Self { dim: 4, fail: true }
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if self.fail {
            return Err(EmbedError::Transport("embedder down".to_string()));
        }
        Ok(texts
            .iter()
            .map(|text| vec![text.len() as f32; self.dim])
            .collect())
    }
}

/// In-memory index: records upserts, answers queries with canned hits.
#[derive(Default)]
pub struct RecordingIndex {
    pub hits: Vec<ScoredHit>,
    pub upserts: Mutex<Vec<VectorPoint>>,
    pub fail_query: bool,
}

impl RecordingIndex {
    pub fn with_hits(hits: Vec<ScoredHit>) -> Self {
        Self {
            hits,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_query: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl VectorIndex for RecordingIndex {
    async fn ensure_ready(&self) -> Result<(), VectorIndexError> {
        Ok(())
    }

    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<(), VectorIndexError> {
        self.upserts.lock().unwrap().extend(points);
        Ok(())
    }

    async fn query(
        &self,
        _vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredHit>, VectorIndexError> {
        if self.fail_query {
            return Err(VectorIndexError::Transport("index down".to_string()));
        }
        Ok(self.hits.iter().take(top_k).cloned().collect())
    }

    async fn healthy(&self) -> bool {
        !self.fail_query
    }
}

/// Chat model yielding canned fragments (or failing on demand).
pub struct FakeModel {
    pub fragments: Vec<String>,
    pub fail: bool,
}

impl FakeModel {
    pub fn with_fragments(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|s| s.to_string()).collect(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fragments: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl ChatModel for FakeModel {
    async fn complete(&self, _messages: &[Message]) -> Result<String, LlmError> {
        if self.fail {
            return Err(LlmError::Transport("model down".to_string()));
        }
        Ok(self.fragments.concat())
    }

    async fn stream(&self, _messages: &[Message]) -> Result<TokenStream, LlmError> {
        if self.fail {
            return Err(LlmError::Transport("model down".to_string()));
        }
        let fragments: Vec<Result<String, LlmError>> =
            self.fragments.iter().cloned().map(Ok).collect();
        Ok(Box::pin(stream::iter(fragments)))
    }
}

/// Drain a stream until `done`, collecting every event.
pub async fn collect_until_done(mut events: EventStream) -> Vec<ChatEvent> {
    let mut collected = Vec::new();
    while let Some(event) = events.recv().await {
        let done = event.is_done();
        collected.push(event);
        if done {
            break;
        }
    }
    collected
}

/// Canned retrieval hit with a text payload.
pub fn hit(doc_id: &str, text: &str, score: f32) -> ScoredHit {
    ScoredHit {
        payload: serde_json::json!({ "doc_id": doc_id, "text": text }),
        score,
    }
}

/// Subscribe first, as a real SSE client would, then return the stream.
pub fn subscribe(hub: &Arc<ConversationHub>, conversation_id: &str) -> EventStream {
    hub.subscribe(conversation_id)
}

/// Two-page PDF with correct xref offsets; page one is well formed, page
/// two's /Contents reference points at an object that does not exist.
pub fn pdf_with_unreadable_second_page() -> Vec<u8> {
    let stream = b"BT /F1 12 Tf 100 700 Td (alpha page text) Tj ET\n";
    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R 6 0 R] /Count 2 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(format!("4 0 obj << /Length {} >> stream\n", stream.len()).as_bytes());
    out.extend_from_slice(stream);
    out.extend_from_slice(b"endstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let o6 = out.len();
    out.extend_from_slice(
        b"6 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 7 0 R >> endobj\n",
    );
    let xref = out.len();
    out.extend_from_slice(b"xref\n0 7\n");
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in [o1, o2, o3, o4, o5, o6] {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 7 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{xref}\n").as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}
