//! In-memory backend: useful for testing and single-process use.

use async_trait::async_trait;
use asklab_core::error::MemoryError;
use asklab_core::memory::{MemoryBackend, MemoryEntry, MemoryQuery};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Stores memories in a Vec and ranks them by query-term overlap.
pub struct InMemoryBackend {
    entries: Arc<RwLock<Vec<MemoryEntry>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(|w| w.to_lowercase())
        .collect()
}

/// Fraction of query terms present in `content`, in [0, 1].
fn overlap_score(query_terms: &HashSet<String>, content: &str) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let content_terms = terms(content);
    let hits = query_terms.iter().filter(|t| content_terms.contains(*t)).count();
    hits as f32 / query_terms.len() as f32
}

#[async_trait]
impl MemoryBackend for InMemoryBackend {
    fn name(&self) -> &str { "in_memory" }

    async fn store(&self, mut entry: MemoryEntry) -> Result<String, MemoryError> {
        if entry.id.is_empty() {
            entry.id = Uuid::new_v4().to_string();
        }
        let id = entry.id.clone();
        self.entries.write().await.push(entry);
        Ok(id)
    }

    async fn search(&self, query: MemoryQuery) -> Result<Vec<MemoryEntry>, MemoryError> {
        let entries = self.entries.read().await;
        let query_terms = terms(&query.text);

        let mut results: Vec<MemoryEntry> = entries
            .iter()
            .filter(|e| query.scope.is_none() || e.scope == query.scope)
            .cloned()
            .map(|mut e| {
                e.score = overlap_score(&query_terms, &e.content);
                e
            })
            .filter(|e| e.score > 0.0 && e.score >= query.min_score)
            .collect();

        // Newest first among equal scores
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        results.truncate(query.limit);

        Ok(results)
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.entries.read().await.len())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.entries.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(content: &str, scope: &str) -> MemoryEntry {
        MemoryEntry::new(content, Some(scope.into()))
    }

    #[tokio::test]
    async fn store_assigns_ids() {
        let mem = InMemoryBackend::new();
        let mut e = entry("Lima is the capital of Peru", "u1");
        e.id.clear();
        let id = mem.store(e).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(mem.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn search_ranks_by_overlap() {
        let mem = InMemoryBackend::new();
        mem.store(entry("User: capital of Peru\n\nAssistant: Lima", "u1")).await.unwrap();
        mem.store(entry("User: population of Peru\n\nAssistant: 34 million", "u1")).await.unwrap();
        mem.store(entry("User: Rust borrow checker", "u1")).await.unwrap();

        let results = mem
            .search(MemoryQuery::scoped("capital Peru", "u1", 10))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].content.contains("Lima"));
        assert!((results[0].score - 1.0).abs() < f32::EPSILON);
        assert!(results[1].score < results[0].score);
    }

    #[tokio::test]
    async fn search_respects_scope() {
        let mem = InMemoryBackend::new();
        mem.store(entry("Peru trivia for alice", "alice")).await.unwrap();
        mem.store(entry("Peru trivia for bob", "bob")).await.unwrap();

        let results = mem.search(MemoryQuery::scoped("Peru", "alice", 10)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("alice"));
    }

    #[tokio::test]
    async fn search_honours_limit() {
        let mem = InMemoryBackend::new();
        for i in 0..5 {
            mem.store(entry(&format!("Peru fact {i}"), "u1")).await.unwrap();
        }
        let results = mem.search(MemoryQuery::scoped("Peru", "u1", 3)).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let mem = InMemoryBackend::new();
        mem.store(entry("one", "u1")).await.unwrap();
        mem.clear().await.unwrap();
        assert_eq!(mem.count().await.unwrap(), 0);
    }
}
