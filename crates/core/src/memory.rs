//! Memory trait: long-term, per-user recollection of past exchanges.
//!
//! Every entry belongs to a scope (the sender id). Searches never cross
//! scopes, so one user's history is invisible to another.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::MemoryError;

/// A single memory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,

    pub content: String,

    /// Owner of this memory (sender id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Free-form attributes (model, conversation id, sources count, ...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,

    /// Relevance score in [0, 1], set by search operations
    #[serde(default)]
    pub score: f32,
}

impl MemoryEntry {
    pub fn new(content: impl Into<String>, scope: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            scope,
            metadata: serde_json::Map::new(),
            created_at: Utc::now(),
            score: 0.0,
        }
    }
}

/// A query for searching memories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryQuery {
    pub text: String,

    /// Only entries with this scope are considered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Minimum relevance score threshold
    #[serde(default)]
    pub min_score: f32,
}

impl MemoryQuery {
    pub fn scoped(text: impl Into<String>, scope: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            scope: Some(scope.into()),
            limit,
            min_score: 0.0,
        }
    }
}

fn default_limit() -> usize {
    3
}

/// The core MemoryBackend trait.
///
/// Implementations: in-memory (tests, local use), Supermemory (HTTP), none.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// The backend name (e.g., "supermemory", "none").
    fn name(&self) -> &str;

    /// Store a new memory entry, returning its id.
    async fn store(&self, entry: MemoryEntry) -> std::result::Result<String, MemoryError>;

    /// Search memories, best match first.
    async fn search(&self, query: MemoryQuery) -> std::result::Result<Vec<MemoryEntry>, MemoryError>;

    async fn count(&self) -> std::result::Result<usize, MemoryError>;

    async fn clear(&self) -> std::result::Result<(), MemoryError>;

    /// Health check: can we reach the backend?
    async fn health_check(&self) -> std::result::Result<(), MemoryError> {
        Ok(())
    }
}
