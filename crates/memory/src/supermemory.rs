//! Supermemory backend: hosted long-term memory over HTTP.
//!
//! Documents are written to `POST /v3/documents` and searched through
//! `POST /v4/search`. The entry scope maps to Supermemory's `containerTag`.

use async_trait::async_trait;
use asklab_core::error::MemoryError;
use asklab_core::memory::{MemoryBackend, MemoryEntry, MemoryQuery};
use serde::Deserialize;
use tracing::{debug, warn};

pub struct SupermemoryBackend {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl SupermemoryBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, MemoryError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| MemoryError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), path, body = %text, "Supermemory request failed");
            return Err(MemoryError::QueryFailed(format!("HTTP {status}: {text}")));
        }
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    memory: Option<String>,
    #[serde(default)]
    chunk: Option<String>,
    #[serde(default)]
    similarity: f32,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Convert a `/v4/search` body into entries, skipping hits without text.
fn parse_search_response(
    body: serde_json::Value,
    scope: Option<&str>,
) -> Result<Vec<MemoryEntry>, MemoryError> {
    let parsed: SearchResponse = serde_json::from_value(body)
        .map_err(|e| MemoryError::QueryFailed(format!("Unexpected search response: {e}")))?;

    Ok(parsed
        .results
        .into_iter()
        .filter_map(|hit| {
            let content = hit.memory.or(hit.chunk)?;
            let mut entry = MemoryEntry::new(content, scope.map(str::to_string));
            if let Some(id) = hit.id {
                entry.id = id;
            }
            entry.score = hit.similarity;
            entry.metadata = hit.metadata.unwrap_or_default();
            Some(entry)
        })
        .collect())
}

#[async_trait]
impl MemoryBackend for SupermemoryBackend {
    fn name(&self) -> &str {
        "supermemory"
    }

    async fn store(&self, entry: MemoryEntry) -> Result<String, MemoryError> {
        let mut body = serde_json::json!({
            "content": entry.content,
            "metadata": entry.metadata,
        });
        if let Some(scope) = &entry.scope {
            body["containerTag"] = serde_json::json!(scope);
        }

        let response = self.post("/v3/documents", &body).await?;
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MemoryError::Storage(format!("Unexpected store response: {e}")))?;

        let id = value["id"].as_str().unwrap_or(&entry.id).to_string();
        debug!(id = %id, "Memory stored");
        Ok(id)
    }

    async fn search(&self, query: MemoryQuery) -> Result<Vec<MemoryEntry>, MemoryError> {
        let mut body = serde_json::json!({
            "q": query.text,
            "limit": query.limit,
        });
        if let Some(scope) = &query.scope {
            body["containerTag"] = serde_json::json!(scope);
        }

        let response = self.post("/v4/search", &body).await?;
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MemoryError::QueryFailed(e.to_string()))?;

        let mut entries = parse_search_response(value, query.scope.as_deref())?;
        entries.retain(|e| e.score >= query.min_score);
        entries.truncate(query.limit);
        Ok(entries)
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Err(MemoryError::Unavailable("Supermemory does not expose a count".into()))
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        Err(MemoryError::Unavailable("Supermemory does not support bulk deletion".into()))
    }

    async fn health_check(&self) -> Result<(), MemoryError> {
        self.post("/v4/search", &serde_json::json!({ "q": "test", "limit": 1 }))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_memory_and_chunk_hits() {
        let body = serde_json::json!({
            "results": [
                {"id": "m1", "memory": "User asked about Lima", "similarity": 0.91},
                {"chunk": "Peru borders Chile", "similarity": 0.42, "metadata": {"type": "research_qa"}},
                {"id": "m3", "similarity": 0.30}
            ]
        });
        let entries = parse_search_response(body, Some("user-1")).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "m1");
        assert_eq!(entries[0].content, "User asked about Lima");
        assert!((entries[0].score - 0.91).abs() < 1e-6);
        assert_eq!(entries[1].metadata["type"], "research_qa");
        assert_eq!(entries[1].scope.as_deref(), Some("user-1"));
    }

    #[test]
    fn empty_results_are_fine() {
        let entries = parse_search_response(serde_json::json!({}), None).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn malformed_results_are_errors() {
        let body = serde_json::json!({"results": "nope"});
        assert!(parse_search_response(body, None).is_err());
    }

    #[test]
    fn base_url_is_normalised() {
        let backend = SupermemoryBackend::new("https://api.supermemory.ai/", "sm_test");
        assert_eq!(backend.base_url, "https://api.supermemory.ai");
        assert_eq!(backend.name(), "supermemory");
    }
}
