//! Deterministic backend that replays canned replies.

use super::{BackendError, BackendReply, ReasoningBackend};
use crate::message::ChatMessage;
use async_trait::async_trait;
use mdr_actions::ToolSchema;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Backend that returns queued replies in order.
///
/// Once the queue is empty it either repeats a fallback reply or fails with
/// a response error. Every call records the history it was sent.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<BackendReply, String>>>,
    fallback: Option<BackendReply>,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    tool_counts: Mutex<Vec<usize>>,
}

impl ScriptedBackend {
    pub fn new(replies: impl IntoIterator<Item = BackendReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            ..Default::default()
        }
    }

    /// A backend that answers every turn with the same reply.
    pub fn repeating(reply: BackendReply) -> Self {
        Self {
            fallback: Some(reply),
            ..Default::default()
        }
    }

    /// Queues a transport failure after the replies already queued.
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(message.into()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Histories received, one per call.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of tool schemas offered on each call.
    pub fn tool_counts(&self) -> Vec<usize> {
        self.tool_counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ReasoningBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(
        &self,
        history: &[ChatMessage],
        tools: &[&ToolSchema],
    ) -> Result<BackendReply, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(history.to_vec());
        self.tool_counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tools.len());

        let next = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match (next, &self.fallback) {
            (Some(Ok(reply)), _) => Ok(reply),
            (Some(Err(message)), _) => Err(BackendError::Http(message)),
            (None, Some(reply)) => Ok(reply.clone()),
            (None, None) => Err(BackendError::Response("script exhausted".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolCallRequest;

    #[tokio::test]
    async fn test_replays_in_order_then_exhausts() {
        let backend = ScriptedBackend::new(vec![
            BackendReply::tool_calls(vec![ToolCallRequest::new("c1", "t", "{}")]),
            BackendReply::text("done"),
        ]);

        assert!(backend.chat(&[], &[]).await.unwrap().has_tool_calls());
        assert_eq!(
            backend.chat(&[], &[]).await.unwrap().content.as_deref(),
            Some("done")
        );
        assert!(backend.chat(&[], &[]).await.is_err());
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_repeating_and_failure_injection() {
        let backend = ScriptedBackend::repeating(BackendReply::text("again"));
        for _ in 0..3 {
            assert!(backend.chat(&[], &[]).await.is_ok());
        }

        let failing = ScriptedBackend::new(Vec::new()).then_fail("connection reset");
        let err = failing.chat(&[ChatMessage::user("x")], &[]).await.unwrap_err();
        assert!(matches!(err, BackendError::Http(_)));
        assert_eq!(failing.requests()[0].len(), 1);
    }
}
