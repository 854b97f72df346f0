//! Per-conversation publish/subscribe channels and the chat event vocabulary.
//!
//! The module is organised around a broadcast-based [`ConversationHub`] keyed
//! by conversation id, with [`EventStream`] handles for consuming the ordered
//! event sequence a chat turn produces. Delivery is fire-and-forget: events
//! published with no live subscriber are lost, and nothing is replayed.

pub mod event;
pub mod hub;

pub use event::{ChatEvent, Citation, ToolName, DONE_EVENT};
pub use hub::{ConversationHub, EventStream};
