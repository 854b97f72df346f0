//! Text embedding capability: text in, fixed-length vector out.
//!
//! Used in batch at ingestion time and for single queries at chat time. The
//! HTTP adapter speaks the Ollama-style batch embed API; tests substitute
//! deterministic fakes through the [`Embedder`] trait.

use async_trait::async_trait;
use miette::Diagnostic;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Errors from the embedding adapter.
#[derive(Debug, Error, Diagnostic)]
pub enum EmbedError {
    #[error("embedding transport error: {0}")]
    #[diagnostic(code(ragline::embeddings::transport))]
    Transport(String),

    #[error("embedding service rejected request ({status}): {body}")]
    #[diagnostic(code(ragline::embeddings::rejected))]
    Rejected { status: u16, body: String },

    #[error("embedding count mismatch: sent {sent} texts, got {got} vectors")]
    #[diagnostic(
        code(ragline::embeddings::count_mismatch),
        help("The embedding service returned a partial batch; check its logs.")
    )]
    CountMismatch { sent: usize, got: usize },
}

impl From<reqwest::Error> for EmbedError {
    fn from(err: reqwest::Error) -> Self {
        EmbedError::Transport(err.to_string())
    }
}

/// Capability interface for turning text into vectors.
///
/// Implementations are stateless from the caller's perspective and safe for
/// concurrent use.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Embed a single text (the chat-time query path).
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vectors = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        vectors.pop().ok_or(EmbedError::CountMismatch { sent: 1, got: 0 })
    }
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// HTTP adapter speaking the Ollama-style `POST /api/embed` batch endpoint.
#[derive(Clone, Debug)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl HttpEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    fn embed_url(&self) -> String {
        format!("{}/api/embed", self.base_url)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(self.embed_url())
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbedResponse = response.json().await?;
        if parsed.embeddings.len() != texts.len() {
            return Err(EmbedError::CountMismatch {
                sent: texts.len(),
                got: parsed.embeddings.len(),
            });
        }
        Ok(parsed.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn embed_batch_round_trips_vectors_in_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/embed")
                    .body_contains("\"input\"");
                then.status(200).json_body(serde_json::json!({
                    "embeddings": [[0.1, 0.2], [0.3, 0.4]],
                }));
            })
            .await;

        let embedder = HttpEmbedder::new(server.base_url(), "test-model");
        let vectors = embedder
            .embed_batch(&["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn partial_batch_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200)
                    .json_body(serde_json::json!({"embeddings": [[0.1]]}));
            })
            .await;

        let embedder = HttpEmbedder::new(server.base_url(), "test-model");
        let err = embedder
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbedError::CountMismatch { sent: 2, got: 1 }));
    }

    #[tokio::test]
    async fn single_embed_uses_batch_path() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200)
                    .json_body(serde_json::json!({"embeddings": [[0.5, 0.6]]}));
            })
            .await;

        let embedder = HttpEmbedder::new(server.base_url(), "test-model");
        assert_eq!(embedder.embed("query").await.unwrap(), vec![0.5, 0.6]);
    }
}
