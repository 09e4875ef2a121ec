//! Channel abstractions: where questions come from and answers go.
//!
//! A [`Channel`] yields incoming user messages. A [`ChatSink`] is the
//! capability the research loop writes progress notices and answer chunks
//! to. The [`RequestContext`] bundles everything one loop invocation needs
//! to know about its caller.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use crate::error::ChannelError;
use crate::turn::ConversationId;

/// A message received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Conversation (chat, DM, terminal session) the message belongs to
    pub conversation_id: ConversationId,

    /// Platform-specific user ID
    pub sender_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    pub content: String,
}

/// A source of user messages.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "cli").
    fn name(&self) -> &str;

    /// Start listening; incoming messages arrive on the returned receiver.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChannelMessage, ChannelError>>,
        ChannelError,
    >;
}

/// Progress notices shown to the user while research runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A snippet of the model's reasoning.
    Thinking { excerpt: String },

    Searching { query: String },

    Reading { title: String, url: String },

    SearchingMemory { query: String },

    /// A page that already failed was requested again.
    SkippedDuplicate { title: String },

    /// The model call is being retried after a transient failure.
    Retrying { attempt: u32 },
}

impl ProgressEvent {
    /// One-line rendering for plain-text surfaces.
    pub fn render(&self) -> String {
        match self {
            Self::Thinking { excerpt } => format!("💭 {excerpt}"),
            Self::Searching { query } => format!("🔍 Searching: {query}"),
            Self::Reading { title, url } => format!("📖 Reading: [{title}]({url})"),
            Self::SearchingMemory { query } => format!("🧠 Checking memory: {query}"),
            Self::SkippedDuplicate { title } => format!("⏭️ Skipping '{title}' (already tried)"),
            Self::Retrying { attempt } => format!("⏳ Retrying model call (attempt {attempt})"),
        }
    }
}

/// The capability to talk back to the user.
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Deliver one user-visible chunk of text.
    async fn send(&self, text: &str) -> std::result::Result<(), ChannelError>;

    /// Report progress. Surfaces without progress display ignore it.
    async fn progress(&self, _event: &ProgressEvent) -> std::result::Result<(), ChannelError> {
        Ok(())
    }
}

/// Everything a research loop knows about the request it serves.
#[derive(Clone)]
pub struct RequestContext {
    pub conversation_id: ConversationId,

    /// Author of the question; scopes long-term memory
    pub sender_id: String,

    pub sink: Arc<dyn ChatSink>,

    /// Cancelled when the caller abandons the request
    pub cancel: CancellationToken,
}

impl RequestContext {
    pub fn new(
        conversation_id: ConversationId,
        sender_id: impl Into<String>,
        sink: Arc<dyn ChatSink>,
    ) -> Self {
        Self {
            conversation_id,
            sender_id: sender_id.into(),
            sink,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("conversation_id", &self.conversation_id)
            .field("sender_id", &self.sender_id)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_event_serialization() {
        let event = ProgressEvent::Searching { query: "Lima".into() };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"searching""#));
        assert!(json.contains(r#""query":"Lima""#));
    }

    #[test]
    fn progress_event_rendering() {
        let event = ProgressEvent::Reading {
            title: "Lima".into(),
            url: "https://en.wikipedia.org/wiki/Lima".into(),
        };
        assert_eq!(
            event.render(),
            "📖 Reading: [Lima](https://en.wikipedia.org/wiki/Lima)"
        );
    }

    #[test]
    fn channel_message_creation() {
        let msg = ChannelMessage {
            conversation_id: ConversationId::from("cli_session"),
            sender_id: "local_user".into(),
            sender_name: None,
            content: "Hello".into(),
        };
        assert_eq!(msg.conversation_id.0, "cli_session");
    }
}
