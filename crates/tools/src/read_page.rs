//! `read_page`: fetch the plain-text extract of one Wikipedia article.

use async_trait::async_trait;
use asklab_core::error::ToolError;
use asklab_core::text::{TRUNCATION_MARKER, truncate_with_marker};
use asklab_core::tool::{Tool, ToolResult};
use std::sync::Arc;

use crate::wikipedia::{PageLookup, WikiSource, article_url};

/// Candidate titles listed for a disambiguation page.
const MAX_CANDIDATES: usize = 5;

pub struct ReadPageTool {
    source: Arc<dyn WikiSource>,
    char_cap: usize,
}

impl ReadPageTool {
    pub fn new(source: Arc<dyn WikiSource>, char_cap: usize) -> Self {
        Self { source, char_cap }
    }
}

#[async_trait]
impl Tool for ReadPageTool {
    fn name(&self) -> &str {
        "read_page"
    }

    fn description(&self) -> &str {
        "Read a Wikipedia article by its exact title (as returned by search). \
         Returns the article text, truncated if long."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Exact article title, e.g. 'Dina Boluarte'"
                }
            },
            "required": ["title"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let title = arguments["title"]
            .as_str()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'title' argument".into()))?;

        match self.source.page(title).await? {
            PageLookup::Found(page) => {
                let text = truncate_with_marker(&page.text, self.char_cap, TRUNCATION_MARKER);
                let canonical = if page.title.is_empty() { title.to_string() } else { page.title };
                Ok(ToolResult::success("", text).with_data(serde_json::json!({
                    "title": canonical,
                    "url": article_url(&canonical),
                })))
            }
            PageLookup::Missing => Ok(ToolResult::empty("", format!("Page '{title}' not found."))),
            PageLookup::Ambiguous(candidates) if candidates.is_empty() => Ok(ToolResult::empty(
                "",
                format!("'{title}' is ambiguous. Search for a more specific title."),
            )),
            PageLookup::Ambiguous(candidates) => {
                let list = candidates
                    .iter()
                    .take(MAX_CANDIDATES)
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join("; ");
                Ok(ToolResult::empty(
                    "",
                    format!("'{title}' is ambiguous. Try one of: {list}"),
                ))
            }
        }
    }
}
