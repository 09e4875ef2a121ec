//! Tool trait: the abstraction over research capabilities.
//!
//! Tools give the model access to information it does not have: Wikipedia
//! search, page extracts and the user's long-term memory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// The tools the research loop knows how to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    Search,
    ReadPage,
    SearchMemory,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::ReadPage => "read_page",
            Self::SearchMemory => "search_memory",
        }
    }

    /// Parse a wire name. Older prompts used the `*_wikipedia` spellings.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "search" | "search_wikipedia" => Some(Self::Search),
            "read_page" | "get_wikipedia_page" => Some(Self::ReadPage),
            "search_memory" => Some(Self::SearchMemory),
            _ => None,
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to execute a tool, with arguments already parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Matches the model's tool_call.id
    pub id: String,

    pub name: String,

    pub arguments: serde_json::Value,
}

/// How a tool execution turned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    /// The tool produced useful content.
    Success,
    /// The tool ran but found nothing (no hits, missing page).
    Empty,
    /// The tool failed; the output explains why.
    Error,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    pub status: ToolStatus,

    /// Text handed back to the model
    pub output: String,

    /// Optional structured data (e.g. the resolved page title)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::with_status(call_id, ToolStatus::Success, output)
    }

    pub fn empty(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::with_status(call_id, ToolStatus::Empty, output)
    }

    pub fn error(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::with_status(call_id, ToolStatus::Error, output)
    }

    fn with_status(call_id: impl Into<String>, status: ToolStatus, output: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            status,
            output: output.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }
}

/// The core Tool trait.
///
/// Each research tool implements this trait and is registered in the
/// [`ToolRegistry`] handed to the research loop.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The wire name of this tool (e.g., "search").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools, ordered by name.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool definitions for the model, in name order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Execute a tool call.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let tool = self.tools.get(&call.name).ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let mut result = tool.execute(call.arguments.clone()).await?;
        result.call_id = call.id.clone();
        Ok(result)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError> {
            let text = arguments["text"].as_str().unwrap_or("").to_string();
            if text.is_empty() {
                return Ok(ToolResult::empty("", "nothing to echo"));
            }
            Ok(ToolResult::success("", text))
        }
    }

    #[test]
    fn tool_name_parses_current_and_legacy_names() {
        assert_eq!(ToolName::parse("search"), Some(ToolName::Search));
        assert_eq!(ToolName::parse("search_wikipedia"), Some(ToolName::Search));
        assert_eq!(ToolName::parse("get_wikipedia_page"), Some(ToolName::ReadPage));
        assert_eq!(ToolName::parse("search_memory"), Some(ToolName::SearchMemory));
        assert_eq!(ToolName::parse("shell"), None);
        assert_eq!(ToolName::ReadPage.to_string(), "read_page");
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.definitions()[0].name, "echo");
    }

    #[tokio::test]
    async fn registry_stamps_call_id() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let call = ToolCall {
            id: "call_1".into(),
            name: "echo".into(),
            arguments: serde_json::json!({"text": "hello world"}),
        };
        let result = registry.execute(&call).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.call_id, "call_1");
        assert_eq!(result.output, "hello world");
    }

    #[tokio::test]
    async fn registry_reports_empty_status() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let call = ToolCall {
            id: "call_2".into(),
            name: "echo".into(),
            arguments: serde_json::json!({}),
        };
        let result = registry.execute(&call).await.unwrap();
        assert_eq!(result.status, ToolStatus::Empty);
    }

    #[tokio::test]
    async fn registry_execute_missing_tool() {
        let registry = ToolRegistry::new();
        let call = ToolCall {
            id: "call_1".into(),
            name: "nonexistent".into(),
            arguments: serde_json::json!({}),
        };
        let err = registry.execute(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}
