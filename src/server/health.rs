use axum::extract::State;
use axum::Json;
use serde_json::json;

use super::AppState;

/// `GET /health` — check the in-process backbone and the vector index
/// independently; `ok` only when both are reachable.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let queue_ok = state.queue.is_connected();
    let index_ok = state.index.healthy().await;

    let status = if queue_ok && index_ok { "ok" } else { "partial" };
    Json(json!({
        "status": status,
        "components": {
            "queue": queue_ok,
            "event_bus": { "channels": state.hub.channel_count() },
            "vector_index": index_ok,
        },
        "queue_depth": state.queue.depth(),
    }))
}
