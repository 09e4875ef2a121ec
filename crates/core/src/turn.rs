//! Turn and conversation identity types.
//!
//! A turn is one message unit of the model-facing transcript. Turns are
//! appended in order and never edited afterwards; compaction produces a new
//! sequence instead of rewriting the old one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata key marking a turn the loop injected itself.
pub const SYNTHETIC_KEY: &str = "synthetic";

/// Unique identifier for a conversation (one chat channel or DM).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// One message in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,

    pub role: Role,

    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// If this is a tool result, which request it answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Turn {
    fn with_role(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content.into())
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content.into())
    }

    /// An assistant turn carrying tool-call requests.
    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        let mut turn = Self::with_role(Role::Assistant, content.into());
        turn.tool_calls = calls;
        turn
    }

    /// A tool result answering the request with id `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut turn = Self::with_role(Role::Tool, content.into());
        turn.tool_call_id = Some(tool_call_id.into());
        turn
    }

    /// A user-role turn injected by the loop, tagged with `kind`.
    pub fn synthetic(kind: &str, content: impl Into<String>) -> Self {
        let mut turn = Self::with_role(Role::User, content.into());
        turn.metadata
            .insert(SYNTHETIC_KEY.into(), serde_json::Value::String(kind.into()));
        turn
    }

    /// The synthetic tag, if the loop injected this turn.
    pub fn synthetic_kind(&self) -> Option<&str> {
        self.metadata.get(SYNTHETIC_KEY).and_then(|v| v.as_str())
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic_kind().is_some()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A tool call the model asked for, as it arrived on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Correlation id, echoed back by the matching result turn
    pub id: String,

    pub name: String,

    /// Arguments as a JSON string (possibly malformed)
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_turn() {
        let turn = Turn::user("Who wrote Dune?");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.content, "Who wrote Dune?");
        assert!(!turn.has_tool_calls());
        assert!(!turn.is_synthetic());
    }

    #[test]
    fn tool_result_carries_correlation_id() {
        let turn = Turn::tool_result("call_7", "- Dune: novel by Frank Herbert");
        assert_eq!(turn.role, Role::Tool);
        assert_eq!(turn.tool_call_id.as_deref(), Some("call_7"));
    }

    #[test]
    fn synthetic_turns_are_tagged() {
        let turn = Turn::synthetic("correction", "Stop planning.");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.synthetic_kind(), Some("correction"));
    }

    #[test]
    fn turn_serialization_roundtrip() {
        let turn = Turn::assistant_with_calls(
            "",
            vec![ToolCallRequest::new("c1", "search", r#"{"query":"Dune"}"#)],
        );
        let json = serde_json::to_string(&turn).unwrap();
        let back: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, turn);
    }
}
