//! # Ragline: Retrieval-Augmented Chat Service
//!
//! Ragline ingests documents (web pages, PDFs), chunks and embeds them into a
//! vector index, and answers chat messages with streamed, cited completions.
//! Every chat turn runs through a single orchestration pipeline that publishes
//! ordered lifecycle events on a per-conversation channel, consumed live by a
//! Server-Sent-Events endpoint.
//!
//! ## Core Concepts
//!
//! - **Events**: Typed `{type, data}` records published per conversation
//! - **Orchestration run**: One retrieve → filter → cite → generate pass for a turn
//! - **Citations**: Relevance-filtered chunks, marker-numbered for inline references
//! - **Ingestion jobs**: Queued URL/PDF work items that populate the vector index
//!
//! ## Quick Start
//!
//! ### Publishing and consuming events
//!
//! ```
//! use ragline::event_bus::{ChatEvent, ConversationHub};
//!
//! let hub = ConversationHub::new(64);
//! let stream = hub.subscribe("conv-1");
//! assert_eq!(hub.subscriber_count("conv-1"), 1);
//!
//! // Delivered to the live subscriber; lost if nobody listens.
//! hub.publish("conv-1", ChatEvent::info("hello"));
//! hub.publish("conv-1", ChatEvent::done());
//! drop(stream);
//! ```
//!
//! ### Building chat messages
//!
//! ```
//! use ragline::message::Message;
//!
//! let user_msg = Message::user("What does the uploaded report conclude?");
//! let system_msg = Message::system("Answer only from the provided snippets.");
//! assert!(user_msg.has_role(Message::USER));
//! ```
//!
//! ## Module Guide
//!
//! - [`config`] - Environment-driven settings for every component
//! - [`message`] - Chat message primitives shared by the store and the LLM adapter
//! - [`event_bus`] - Per-conversation publish/subscribe hub and the event vocabulary
//! - [`orchestrator`] - The chat-turn state machine, citation selection, prompts
//! - [`ingestion`] - Job queue, extraction, chunking, and the worker pipeline
//! - [`store`] - Relational persistence for conversations, messages, documents
//! - [`vector`] - Vector index capability trait and the HTTP adapter
//! - [`embeddings`] - Text embedding capability trait and the HTTP adapter
//! - [`llm`] - Chat model capability trait with streaming completions
//! - [`server`] - The axum HTTP surface (chat, streaming, ingestion, health)

pub mod config;
pub mod embeddings;
pub mod event_bus;
pub mod ingestion;
pub mod llm;
pub mod message;
pub mod orchestrator;
pub mod server;
pub mod store;
pub mod vector;
