use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::Stream;
use serde::Deserialize;
use serde_json::json;

use crate::llm::ChatModel;
use crate::message::Message;
use crate::orchestrator::citations::truncate_chars;
use crate::store::SqliteStore;

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub conversation_id: Option<String>,
    pub message: String,
}

/// `POST /chat` — accept a user message and kick off an orchestration run.
///
/// Returns immediately; the answer arrives on the conversation's SSE stream.
pub async fn submit(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let message = request.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }

    let conversation_id = match request.conversation_id {
        Some(id) => {
            if !state.store.conversation_exists(&id).await? {
                return Err(ApiError::not_found("conversation not found"));
            }
            id
        }
        None => {
            let conversation = state.store.create_conversation("").await?;
            spawn_title_task(
                state.store.clone(),
                state.model.clone(),
                conversation.conversation_id.clone(),
                message.clone(),
            );
            conversation.conversation_id
        }
    };

    let record = state
        .store
        .append_message(&conversation_id, Message::USER, &message, json!({}))
        .await?;

    let orchestrator = state.orchestrator.clone();
    let run_conversation = conversation_id.clone();
    tokio::spawn(async move {
        orchestrator.run(&run_conversation, &message).await;
    });

    Ok(Json(json!({
        "conversation_id": conversation_id,
        "message_id": record.message_id,
    })))
}

/// Derive a short conversation title in the background.
///
/// Best effort: a model failure falls back to a truncated copy of the first
/// message, and the title only lands if it is still unset.
fn spawn_title_task(
    store: Arc<SqliteStore>,
    model: Arc<dyn ChatModel>,
    conversation_id: String,
    first_message: String,
) {
    tokio::spawn(async move {
        let prompt = vec![
            Message::system(
                "Produce a concise title (at most six words) for a conversation \
                 that starts with the user message below. Reply with the title \
                 only, no quotes.",
            ),
            Message::user(&first_message),
        ];
        let title = match model.complete(&prompt).await {
            Ok(title) => {
                let title = title.trim().trim_matches('"').to_string();
                if title.is_empty() {
                    truncate_chars(&first_message, 50)
                } else {
                    truncate_chars(&title, 80)
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, "title derivation failed; using message prefix");
                truncate_chars(&first_message, 50)
            }
        };
        if let Err(err) = store.set_title_if_empty(&conversation_id, &title).await {
            tracing::warn!(
                conversation = %conversation_id,
                error = %err,
                "failed to store derived title"
            );
        }
    });
}

/// `GET /chat/{conversation_id}/stream` — live event stream for one
/// conversation.
///
/// The subscription is registered before this function returns, so a client
/// that connects within the orchestrator's wait bound sees the full event
/// sequence. The stream ends after the `done` event.
pub async fn stream(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut events = state.hub.subscribe(&conversation_id);

    let stream = async_stream::stream! {
        while let Some(event) = events.recv().await {
            let done = event.is_done();
            yield Ok(Event::default()
                .event(event.event_type())
                .data(event.data().to_string()));
            if done {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
