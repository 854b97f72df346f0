use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Wire name of the terminal event that closes every stream reader loop.
pub const DONE_EVENT: &str = "done";

/// The tools a chat turn reports progress for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolName {
    SearchDocuments,
    GenerateAnswer,
}

impl AsRef<str> for ToolName {
    fn as_ref(&self) -> &str {
        match self {
            ToolName::SearchDocuments => "search_documents",
            ToolName::GenerateAnswer => "generate_answer",
        }
    }
}

/// A chunk selected for the generation prompt, annotated with its reference
/// marker and provenance.
///
/// Citations exist only within one orchestration run; they are published on
/// the event channel for progressive rendering and never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based marker id, in descending-score order.
    pub marker: usize,
    /// Owning document id.
    pub doc_id: String,
    /// 1-based page number for PDF-derived chunks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u64>,
    /// Page-local character offset where the chunk starts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_offset: Option<u64>,
    /// Page-local character offset where the chunk ends (exclusive).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_offset: Option<u64>,
    /// Excerpt of the chunk text, truncated to the configured bound.
    pub text: String,
    /// Similarity score reported by the vector index.
    pub score: f32,
}

/// One typed event on a conversation channel.
///
/// Events serialize to `{type, data}` records; [`ChatEvent::event_type`] and
/// [`ChatEvent::data`] give the two halves, and [`ChatEvent::to_sse`] renders
/// the Server-Sent-Events wire shape.
///
/// # Examples
///
/// ```
/// use ragline::event_bus::ChatEvent;
///
/// let event = ChatEvent::text_delta("Hel");
/// assert_eq!(event.event_type(), "text_delta");
/// assert_eq!(event.data()["delta"], "Hel");
/// assert_eq!(event.to_sse(), "event: text_delta\ndata: {\"delta\":\"Hel\"}\n\n");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ChatEvent {
    /// Typing indicator toggled at the start and end of every run.
    Typing { started: bool },
    /// A pipeline tool began executing.
    ToolCallStarted { tool: ToolName },
    /// A pipeline tool finished; `count` carries the retrieval hit count.
    ToolCallFinished {
        tool: ToolName,
        count: Option<usize>,
    },
    /// The complete citation list for this run, published before the
    /// per-entry `citation` events.
    CitationMap { citations: Vec<Citation> },
    /// One citation entry, for progressive rendering.
    Citation(Citation),
    /// An incremental fragment of the generated answer.
    TextDelta { delta: String },
    /// Advisory message (no subscriber detected, low confidence, no hits).
    Info { message: String },
    /// A failure captured inside the run; the run still terminates cleanly.
    Error { error: String },
    /// Terminal event; always published last, exactly once per run.
    Done,
}

impl ChatEvent {
    pub fn typing_started() -> Self {
        ChatEvent::Typing { started: true }
    }

    pub fn typing_stopped() -> Self {
        ChatEvent::Typing { started: false }
    }

    pub fn tool_started(tool: ToolName) -> Self {
        ChatEvent::ToolCallStarted { tool }
    }

    pub fn tool_finished(tool: ToolName, count: Option<usize>) -> Self {
        ChatEvent::ToolCallFinished { tool, count }
    }

    pub fn citation_map(citations: Vec<Citation>) -> Self {
        ChatEvent::CitationMap { citations }
    }

    pub fn citation(citation: Citation) -> Self {
        ChatEvent::Citation(citation)
    }

    pub fn text_delta(delta: impl Into<String>) -> Self {
        ChatEvent::TextDelta {
            delta: delta.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        ChatEvent::Info {
            message: message.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        ChatEvent::Error {
            error: error.into(),
        }
    }

    pub fn done() -> Self {
        ChatEvent::Done
    }

    /// The event's wire name, used as the SSE `event:` line.
    pub fn event_type(&self) -> &'static str {
        match self {
            ChatEvent::Typing { .. } => "typing",
            ChatEvent::ToolCallStarted { .. } => "tool_call_started",
            ChatEvent::ToolCallFinished { .. } => "tool_call_finished",
            ChatEvent::CitationMap { .. } => "citation_map",
            ChatEvent::Citation(_) => "citation",
            ChatEvent::TextDelta { .. } => "text_delta",
            ChatEvent::Info { .. } => "info",
            ChatEvent::Error { .. } => "error",
            ChatEvent::Done => DONE_EVENT,
        }
    }

    /// The event's JSON payload, used as the SSE `data:` line.
    pub fn data(&self) -> Value {
        match self {
            ChatEvent::Typing { started } => json!({
                "status": if *started { "started" } else { "stopped" },
            }),
            ChatEvent::ToolCallStarted { tool } => json!({ "tool": tool.as_ref() }),
            ChatEvent::ToolCallFinished { tool, count } => match count {
                Some(count) => json!({ "tool": tool.as_ref(), "count": count }),
                None => json!({ "tool": tool.as_ref() }),
            },
            ChatEvent::CitationMap { citations } => json!({ "citations": citations }),
            ChatEvent::Citation(citation) => {
                serde_json::to_value(citation).unwrap_or(Value::Null)
            }
            ChatEvent::TextDelta { delta } => json!({ "delta": delta }),
            ChatEvent::Info { message } => json!({ "message": message }),
            ChatEvent::Error { error } => json!({ "error": error }),
            ChatEvent::Done => json!({ "finished": true }),
        }
    }

    /// Render the event in Server-Sent-Events wire shape: an `event:` line,
    /// a `data:` line with the JSON payload, and a blank line terminator.
    pub fn to_sse(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event_type(), self.data())
    }

    /// True for the terminal event that ends a stream reader loop.
    pub fn is_done(&self) -> bool {
        matches!(self, ChatEvent::Done)
    }
}
