//! `search_memory`: recall the asking user's past conversations.
//!
//! The scope (the sender id) is not part of the model-facing schema; the
//! research loop injects it into the arguments before dispatch so a model
//! can never read another user's memories.

use async_trait::async_trait;
use asklab_core::error::ToolError;
use asklab_core::memory::{MemoryBackend, MemoryQuery};
use asklab_core::text::prefix_chars;
use asklab_core::tool::{Tool, ToolResult};
use std::sync::Arc;

/// Characters of each memory shown to the model.
const SNIPPET_CHARS: usize = 200;

pub struct MemorySearchTool {
    backend: Arc<dyn MemoryBackend>,
    limit: usize,
}

impl MemorySearchTool {
    pub fn new(backend: Arc<dyn MemoryBackend>, limit: usize) -> Self {
        Self {
            backend,
            limit: limit.max(1),
        }
    }
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "search_memory"
    }

    fn description(&self) -> &str {
        "Search this user's past conversations with you. Use it when the user refers to \
         something discussed before or asks what they asked earlier."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look for in past conversations"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let scope = arguments["scope"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing memory scope".into()))?;

        let entries = self
            .backend
            .search(MemoryQuery::scoped(query, scope, self.limit))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "search_memory".into(),
                reason: e.to_string(),
            })?;

        if entries.is_empty() {
            return Ok(ToolResult::empty("", "No relevant past conversations found."));
        }

        let snippets = entries
            .iter()
            .map(|e| format!("[similarity {:.2}] {}", e.score, prefix_chars(&e.content, SNIPPET_CHARS)))
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(ToolResult::success("", format!("Past conversations found:\n{snippets}")))
    }
}
