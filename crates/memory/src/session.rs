//! Bounded in-memory session store.

use async_trait::async_trait;
use asklab_core::error::MemoryError;
use asklab_core::session::SessionStore;
use asklab_core::turn::{ConversationId, Turn};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;

/// Conversations kept unless the host asks for another cap.
pub const DEFAULT_MAX_CONVERSATIONS: usize = 1000;

/// Keeps the last `max_turns` turns of at most `max_conversations`
/// conversations. Appending to a new conversation at capacity evicts the
/// one written to least recently.
pub struct InMemorySessionStore {
    max_turns: usize,
    max_conversations: usize,
    inner: RwLock<Sessions>,
}

#[derive(Default)]
struct Sessions {
    by_id: HashMap<ConversationId, Session>,
    // Monotonic write counter used as the recency stamp
    clock: u64,
}

struct Session {
    turns: VecDeque<Turn>,
    last_write: u64,
}

impl InMemorySessionStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns,
            max_conversations: DEFAULT_MAX_CONVERSATIONS,
            inner: RwLock::new(Sessions::default()),
        }
    }

    pub fn with_max_conversations(mut self, max_conversations: usize) -> Self {
        self.max_conversations = max_conversations.max(1);
        self
    }

    /// Number of conversations with stored history.
    pub async fn len(&self) -> usize {
        self.inner.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Sessions {
    fn evict_stalest(&mut self) {
        let stalest = self
            .by_id
            .iter()
            .min_by_key(|(_, session)| session.last_write)
            .map(|(id, _)| id.clone());
        if let Some(id) = stalest {
            debug!(conversation_id = %id, "Evicting stalest conversation");
            self.by_id.remove(&id);
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, conversation: &ConversationId) -> Result<Vec<Turn>, MemoryError> {
        Ok(self
            .inner
            .read()
            .await
            .by_id
            .get(conversation)
            .map(|session| session.turns.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn append(&self, conversation: &ConversationId, turns: Vec<Turn>) -> Result<(), MemoryError> {
        let mut inner = self.inner.write().await;
        inner.clock += 1;
        let now = inner.clock;

        if !inner.by_id.contains_key(conversation) && inner.by_id.len() >= self.max_conversations {
            inner.evict_stalest();
        }

        let session = inner.by_id.entry(conversation.clone()).or_insert_with(|| Session {
            turns: VecDeque::new(),
            last_write: now,
        });
        session.last_write = now;
        session.turns.extend(turns);
        while session.turns.len() > self.max_turns {
            session.turns.pop_front();
        }
        Ok(())
    }

    async fn clear(&self, conversation: &ConversationId) -> Result<(), MemoryError> {
        self.inner.write().await.by_id.remove(conversation);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_conversation_is_empty() {
        let store = InMemorySessionStore::new(6);
        let turns = store.get(&ConversationId::from("nope")).await.unwrap();
        assert!(turns.is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn append_keeps_last_turns() {
        let store = InMemorySessionStore::new(4);
        let conv = ConversationId::from("chan-1");
        for i in 0..3 {
            store
                .append(&conv, vec![Turn::user(format!("q{i}")), Turn::assistant(format!("a{i}"))])
                .await
                .unwrap();
        }
        let turns = store.get(&conv).await.unwrap();
        let contents: Vec<&str> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2", "a2"]);
    }

    #[tokio::test]
    async fn conversations_are_isolated() {
        let store = InMemorySessionStore::new(6);
        let a = ConversationId::from("a");
        let b = ConversationId::from("b");
        store.append(&a, vec![Turn::user("for a")]).await.unwrap();
        assert!(store.get(&b).await.unwrap().is_empty());

        store.clear(&a).await.unwrap();
        assert!(store.get(&a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn conversation_count_is_capped() {
        let store = InMemorySessionStore::new(6).with_max_conversations(3);
        for id in ["a", "b", "c"] {
            store.append(&ConversationId::from(id), vec![Turn::user(id)]).await.unwrap();
        }
        // "a" was written most recently, so "b" is now the stalest
        store.append(&ConversationId::from("a"), vec![Turn::assistant("again")]).await.unwrap();

        for id in ["d", "e"] {
            store.append(&ConversationId::from(id), vec![Turn::user(id)]).await.unwrap();
        }

        assert_eq!(store.len().await, 3);
        assert!(store.get(&ConversationId::from("b")).await.unwrap().is_empty());
        assert!(store.get(&ConversationId::from("c")).await.unwrap().is_empty());
        assert_eq!(store.get(&ConversationId::from("a")).await.unwrap().len(), 2);
        assert_eq!(store.get(&ConversationId::from("e")).await.unwrap()[0].content, "e");
    }
}
