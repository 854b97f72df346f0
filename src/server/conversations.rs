use axum::extract::{Path, State};
use axum::Json;
use serde_json::json;

use super::{ApiError, AppState};

/// `GET /conversations` — every conversation with its (possibly still empty)
/// title.
pub async fn list(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let conversations = state.store.list_conversations().await?;
    Ok(Json(json!({ "conversations": conversations })))
}

/// `GET /conversations/{conversation_id}/history` — messages oldest first.
pub async fn history(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.store.conversation_exists(&conversation_id).await? {
        return Err(ApiError::not_found("conversation not found"));
    }
    let messages = state.store.history(&conversation_id).await?;
    Ok(Json(json!({ "messages": messages })))
}
