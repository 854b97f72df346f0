//! Chat model capability: synchronous completion plus a streaming primitive
//! that yields incremental text fragments.
//!
//! The HTTP adapter targets OpenAI-compatible chat completion endpoints and
//! parses their `data:` SSE frames; fragment shape drift across providers is
//! tolerated by an explicit extraction order rather than strict typing.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use miette::Diagnostic;
use serde_json::{json, Value};
use thiserror::Error;

use crate::message::Message;

/// Lazy sequence of generated text fragments, in generation order.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Errors from the chat model adapter.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("llm transport error: {0}")]
    #[diagnostic(code(ragline::llm::transport))]
    Transport(String),

    #[error("llm rejected request ({status}): {body}")]
    #[diagnostic(code(ragline::llm::rejected))]
    Rejected { status: u16, body: String },

    #[error("llm returned no completion text")]
    #[diagnostic(code(ragline::llm::empty_completion))]
    EmptyCompletion,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Transport(err.to_string())
    }
}

/// Capability interface over a chat model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run a full completion and return the final text.
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// Start a streaming completion yielding incremental fragments.
    async fn stream(&self, messages: &[Message]) -> Result<TokenStream, LlmError>;
}

/// OpenAI-compatible HTTP adapter (`POST {base}/chat/completions`).
#[derive(Clone, Debug)]
pub struct OpenAiCompatModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatModel {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request(&self, messages: &[Message], stream: bool) -> reqwest::RequestBuilder {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
        });
        let mut request = self.client.post(self.completions_url()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request
    }

    async fn send_checked(
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, LlmError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Pull the incremental text out of one streamed completion frame.
///
/// Providers disagree on the exact field; try, in order, the chat delta,
/// the legacy completion `text`, and a bare `content`.
fn extract_delta(frame: &Value) -> Option<String> {
    let choice = frame.get("choices").and_then(|c| c.get(0));
    if let Some(choice) = choice {
        if let Some(content) = choice
            .pointer("/delta/content")
            .or_else(|| choice.get("text"))
            .and_then(Value::as_str)
        {
            return Some(content.to_string());
        }
    }
    frame
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl ChatModel for OpenAiCompatModel {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let response = Self::send_checked(self.request(messages, false)).await?;
        let body: Value = response.json().await?;
        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|text| !text.is_empty())
            .ok_or(LlmError::EmptyCompletion)
    }

    async fn stream(&self, messages: &[Message]) -> Result<TokenStream, LlmError> {
        let response = Self::send_checked(self.request(messages, true)).await?;
        let mut bytes = response.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer = String::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        yield Err(LlmError::Transport(err.to_string()));
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(newline) = buffer.find('\n') {
                    let line: String = buffer.drain(..=newline).collect();
                    let Some(data) = line.trim().strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data == "[DONE]" {
                        return;
                    }
                    let Ok(frame) = serde_json::from_str::<Value>(data) else {
                        continue;
                    };
                    if let Some(delta) = extract_delta(&frame) {
                        if !delta.is_empty() {
                            yield Ok(delta);
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
