use async_trait::async_trait;
use serde_json::{json, Value};

use super::{normalize_hits, ScoredHit, VectorIndex, VectorIndexError, VectorPoint};

/// Qdrant-style HTTP adapter for the [`VectorIndex`] capability.
///
/// Talks plain JSON over REST so no index client library version can change
/// the result envelope out from under us; whatever comes back goes through
/// [`normalize_hits`](super::normalize_hits).
#[derive(Clone, Debug)]
pub struct QdrantIndex {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    vector_dim: usize,
}

impl QdrantIndex {
    pub fn new(base_url: impl Into<String>, collection: impl Into<String>, vector_dim: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            vector_dim,
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    async fn check_rejection(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, VectorIndexError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(VectorIndexError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_ready(&self) -> Result<(), VectorIndexError> {
        let response = self
            .client
            .put(self.collection_url())
            .json(&json!({
                "vectors": { "size": self.vector_dim, "distance": "Cosine" }
            }))
            .send()
            .await?;

        // An existing collection answers with a conflict; that is ready too.
        if response.status().is_success() || response.status() == reqwest::StatusCode::CONFLICT {
            return Ok(());
        }
        Self::check_rejection(response).await.map(|_| ())
    }

    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<(), VectorIndexError> {
        if points.is_empty() {
            return Ok(());
        }
        let body = json!({
            "points": points
                .iter()
                .map(|point| json!({
                    "id": point.id.to_string(),
                    "vector": point.vector,
                    "payload": point.payload,
                }))
                .collect::<Vec<_>>(),
        });

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&body)
            .send()
            .await?;
        Self::check_rejection(response).await.map(|_| ())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredHit>, VectorIndexError> {
        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&json!({
                "vector": vector,
                "limit": top_k,
                "with_payload": true,
            }))
            .send()
            .await?;
        let response = Self::check_rejection(response).await?;
        let body: Value = response.json().await?;
        Ok(normalize_hits(&body))
    }

    async fn healthy(&self) -> bool {
        match self
            .client
            .get(format!("{}/collections", self.base_url))
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn query_normalizes_search_envelope() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/chunks/points/search");
                then.status(200).json_body(serde_json::json!({
                    "result": [
                        {"id": "1", "score": 0.91, "payload": {"doc_id": "d1", "text": "alpha"}},
                        {"id": "2", "score": 0.42, "payload": {"doc_id": "d2", "text": "beta"}},
                    ],
                    "status": "ok",
                }));
            })
            .await;

        let index = QdrantIndex::new(server.base_url(), "chunks", 4);
        let hits = index.query(&[0.0, 0.1, 0.2, 0.3], 5).await.unwrap();

        mock.assert_async().await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].payload["doc_id"], "d1");
    }

    #[tokio::test]
    async fn upsert_sends_points_with_string_ids() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/chunks/points")
                    .body_contains("\"payload\"");
                then.status(200)
                    .json_body(serde_json::json!({"status": "ok"}));
            })
            .await;

        let index = QdrantIndex::new(server.base_url(), "chunks", 2);
        let point = VectorPoint {
            id: Uuid::new_v4(),
            vector: vec![0.1, 0.2],
            payload: serde_json::json!({"doc_id": "d1", "text": "alpha"}),
        };
        index.upsert(vec![point]).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejection_surfaces_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path_contains("/points/search");
                then.status(500).body("boom");
            })
            .await;

        let index = QdrantIndex::new(server.base_url(), "chunks", 2);
        let err = index.query(&[0.1, 0.2], 5).await.unwrap_err();
        match err {
            VectorIndexError::Rejected { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn healthy_reflects_reachability() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections");
                then.status(200).json_body(serde_json::json!({"result": {"collections": []}}));
            })
            .await;

        let index = QdrantIndex::new(server.base_url(), "chunks", 2);
        assert!(index.healthy().await);

        let unreachable = QdrantIndex::new("http://127.0.0.1:1", "chunks", 2);
        assert!(!unreachable.healthy().await);
    }
}
