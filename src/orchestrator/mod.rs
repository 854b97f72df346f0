//! The chat-turn state machine.
//!
//! [`Orchestrator::run`] drives retrieve → filter → cite → generate for one
//! turn, publishing a deterministic event sequence on the conversation's
//! channel. The terminal guarantee holds on every path, success or failure:
//! exactly one `typing{started}`, one `typing{stopped}`, and one `done`,
//! with `done` last.

pub mod citations;
pub mod prompt;

use std::sync::Arc;

use futures_util::StreamExt;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;
use tokio::time::{sleep, Instant};

use crate::config::RetrievalConfig;
use crate::embeddings::{EmbedError, Embedder};
use crate::event_bus::{ChatEvent, ConversationHub, ToolName};
use crate::llm::{ChatModel, LlmError};
use crate::message::Message;
use crate::store::{SqliteStore, StoreError};
use crate::vector::{ScoredHit, VectorIndex, VectorIndexError};

use citations::select_citations;

/// A failure inside the retrieval/generation stages of a run.
///
/// Never escapes [`Orchestrator::run`]; it becomes a single `error` event
/// before the terminal sequence.
#[derive(Debug, Error, Diagnostic)]
pub enum RunError {
    #[error("embedding failed: {0}")]
    #[diagnostic(code(ragline::orchestrator::embed))]
    Embed(#[from] EmbedError),

    #[error("retrieval failed: {0}")]
    #[diagnostic(code(ragline::orchestrator::retrieval))]
    Retrieval(#[from] VectorIndexError),

    #[error("generation failed: {0}")]
    #[diagnostic(code(ragline::orchestrator::generation))]
    Generation(#[from] LlmError),

    #[error("persisting assistant message failed: {0}")]
    #[diagnostic(code(ragline::orchestrator::persist))]
    Persist(#[from] StoreError),
}

/// Drives one chat turn end to end.
///
/// Adapters are long-lived injected dependencies constructed once at process
/// start; the orchestrator holds them by reference and keeps no mutable
/// state, so concurrent runs for different conversations are independent.
pub struct Orchestrator {
    hub: Arc<ConversationHub>,
    store: Arc<SqliteStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn ChatModel>,
    config: RetrievalConfig,
}

impl Orchestrator {
    pub fn new(
        hub: Arc<ConversationHub>,
        store: Arc<SqliteStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            hub,
            store,
            index,
            embedder,
            model,
            config,
        }
    }

    /// Run the pipeline for one user message.
    ///
    /// Infallible by contract: stage failures degrade to an `error` event and
    /// the run still finishes with `typing{stopped}` then `done`.
    pub async fn run(&self, conversation_id: &str, user_message: &str) {
        self.await_subscriber(conversation_id).await;

        self.hub
            .publish(conversation_id, ChatEvent::typing_started());

        if let Err(err) = self.drive(conversation_id, user_message).await {
            tracing::warn!(
                conversation = %conversation_id,
                error = %err,
                "orchestration run failed; emitting error event"
            );
            self.hub
                .publish(conversation_id, ChatEvent::error(err.to_string()));
        }

        self.hub
            .publish(conversation_id, ChatEvent::typing_stopped());
        self.hub.publish(conversation_id, ChatEvent::done());
    }

    /// Bounded wait for a stream subscriber before the first event.
    ///
    /// Narrows the race between "client opens the stream" and "first event
    /// published"; it is not a delivery guarantee and never blocks past the
    /// configured bound.
    async fn await_subscriber(&self, conversation_id: &str) {
        let deadline = Instant::now() + self.config.subscriber_wait;
        loop {
            if self.hub.subscriber_count(conversation_id) > 0 {
                return;
            }
            if Instant::now() >= deadline {
                tracing::debug!(
                    conversation = %conversation_id,
                    "no subscriber within wait bound; proceeding anyway"
                );
                self.hub.publish(
                    conversation_id,
                    ChatEvent::info("no subscriber detected; proceeding without a listener"),
                );
                return;
            }
            sleep(self.config.poll_interval).await;
        }
    }

    async fn drive(&self, conversation_id: &str, user_message: &str) -> Result<(), RunError> {
        // Retrieve.
        self.hub.publish(
            conversation_id,
            ChatEvent::tool_started(ToolName::SearchDocuments),
        );
        let hits = self.search_documents(user_message).await?;

        // Filter & cite.
        let citations = if hits.is_empty() {
            self.hub.publish(
                conversation_id,
                ChatEvent::tool_finished(ToolName::SearchDocuments, Some(0)),
            );
            self.hub.publish(
                conversation_id,
                ChatEvent::info("No relevant documents found"),
            );
            Vec::new()
        } else {
            let outcome = select_citations(&hits, &self.config);
            if outcome.low_confidence {
                self.hub.publish(
                    conversation_id,
                    ChatEvent::info(
                        "All results scored below the relevance threshold; showing best matches",
                    ),
                );
            }
            self.hub.publish(
                conversation_id,
                ChatEvent::citation_map(outcome.citations.clone()),
            );
            for citation in &outcome.citations {
                self.hub
                    .publish(conversation_id, ChatEvent::citation(citation.clone()));
            }
            self.hub.publish(
                conversation_id,
                ChatEvent::tool_finished(ToolName::SearchDocuments, Some(outcome.citations.len())),
            );
            outcome.citations
        };

        // Generate.
        self.hub.publish(
            conversation_id,
            ChatEvent::tool_started(ToolName::GenerateAnswer),
        );
        let messages = prompt::build_messages(user_message, &citations);
        let mut fragments = self.model.stream(&messages).await?;

        let mut answer = String::new();
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            answer.push_str(&fragment);
            self.hub
                .publish(conversation_id, ChatEvent::text_delta(fragment));
        }
        self.hub.publish(
            conversation_id,
            ChatEvent::tool_finished(ToolName::GenerateAnswer, None),
        );

        // The answer already reached the client; a history-write failure is
        // logged rather than reported as a run error.
        if !answer.is_empty() {
            let metadata = json!({ "citations": citations.len() });
            if let Err(err) = self
                .store
                .append_message(conversation_id, Message::ASSISTANT, &answer, metadata)
                .await
            {
                tracing::warn!(
                    conversation = %conversation_id,
                    error = %err,
                    "failed to persist assistant message"
                );
            }
        }

        Ok(())
    }

    /// Embed the user message and query the index for the top-K chunks.
    async fn search_documents(&self, query: &str) -> Result<Vec<ScoredHit>, RunError> {
        let vector = self.embedder.embed(query).await?;
        let hits = self.index.query(&vector, self.config.top_k).await?;
        tracing::debug!(hits = hits.len(), top_k = self.config.top_k, "retrieval complete");
        Ok(hits)
    }
}
