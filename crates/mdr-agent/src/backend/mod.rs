//! Reasoning backends.
//!
//! Every backend turns a conversation into one [`BackendReply`], so the
//! engine never needs to know which provider it is talking to.

mod gemini;
mod openai;
mod scripted;

pub use gemini::{GeminiBackend, GeminiConfig};
pub use openai::{OpenAiBackend, OpenAiConfig};
pub use scripted::ScriptedBackend;

use crate::message::{ChatMessage, ToolCallRequest};
use async_trait::async_trait;
use mdr_actions::ToolSchema;
use std::sync::Arc;
use thiserror::Error;

/// Normalized model reply: optional text plus tool calls in model order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl BackendReply {
    /// A reply that ends the investigation.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// A reply that requests tools.
    pub fn tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: None,
            tool_calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Backend errors.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("http error: {0}")]
    Http(String),
    #[error("response error: {0}")]
    Response(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A model that can take one conversational turn.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Short identifier used in logs and metrics.
    fn name(&self) -> &str;

    /// Sends the full history and the available tools, returns the next turn.
    async fn chat(
        &self,
        history: &[ChatMessage],
        tools: &[&ToolSchema],
    ) -> Result<BackendReply, BackendError>;
}

#[async_trait]
impl ReasoningBackend for Arc<dyn ReasoningBackend> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn chat(
        &self,
        history: &[ChatMessage],
        tools: &[&ToolSchema],
    ) -> Result<BackendReply, BackendError> {
        (**self).chat(history, tools).await
    }
}

/// Cuts a response body down to something loggable.
pub(crate) fn truncate_body(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short", 10), "short");
        assert_eq!(truncate_body("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn test_reply_constructors() {
        assert!(!BackendReply::text("done").has_tool_calls());
        let reply = BackendReply::tool_calls(vec![ToolCallRequest::new("c1", "t", "{}")]);
        assert!(reply.has_tool_calls());
        assert!(reply.content.is_none());
    }
}
