//! Session store: the rolling per-conversation history.
//!
//! The history is an advisory cache read when a question arrives and
//! appended once an answer is produced. Concurrent writers are resolved
//! last-writer-wins.

use async_trait::async_trait;
use crate::error::MemoryError;
use crate::turn::{ConversationId, Turn};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The most recent turns of a conversation, oldest first.
    async fn get(&self, conversation: &ConversationId) -> Result<Vec<Turn>, MemoryError>;

    /// Append turns; the store may evict older turns to stay within its window.
    async fn append(&self, conversation: &ConversationId, turns: Vec<Turn>) -> Result<(), MemoryError>;

    /// Forget a conversation entirely.
    async fn clear(&self, conversation: &ConversationId) -> Result<(), MemoryError>;
}
