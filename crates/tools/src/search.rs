//! `search`: find candidate Wikipedia articles for a query.

use async_trait::async_trait;
use asklab_core::error::ToolError;
use asklab_core::tool::{Tool, ToolResult};
use std::sync::Arc;

use crate::wikipedia::WikiSource;

pub struct SearchTool {
    source: Arc<dyn WikiSource>,
    max_results: usize,
}

impl SearchTool {
    pub fn new(source: Arc<dyn WikiSource>, max_results: usize) -> Self {
        Self {
            source,
            max_results: max_results.max(1),
        }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search Wikipedia. Returns up to 5 article titles with a short snippet each. \
         Use the exact title with read_page to read an article."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search terms, e.g. 'current president of Peru'"
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

        let hits = self.source.search(query, self.max_results).await?;
        if hits.is_empty() {
            return Ok(ToolResult::empty("", "No results found."));
        }

        let output = hits
            .iter()
            .take(self.max_results)
            .map(|h| format!("- {}: {}", h.title, h.snippet))
            .collect::<Vec<_>>()
            .join("\n");
        let titles: Vec<&str> = hits.iter().take(self.max_results).map(|h| h.title.as_str()).collect();

        Ok(ToolResult::success("", output).with_data(serde_json::json!({ "titles": titles })))
    }
}
