//! Conversation message types.
//!
//! A [`Message`] is one entry in the list sent to a chat-completion endpoint.
//! Roles form a closed set; assistant messages optionally carry tool calls,
//! tool messages are linked to the call they answer via `tool_call_id`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role tag of a conversation message. Closed set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System prompt.
    System,
    /// Operator input.
    User,
    /// Model output (text and/or tool calls).
    Assistant,
    /// Tool result, linked by call id.
    Tool,
}

impl Role {
    /// Wire string for this role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// A resolved tool call with parsed arguments.
///
/// `id` is unique within a session; duplicates are rejected by the
/// orchestrator before execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call id assigned by the model.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Parsed argument object.
    pub arguments: Map<String, Value>,
}

/// A single message in a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role tag.
    pub role: Role,
    /// Text content. May be empty for assistant messages that only carry
    /// tool calls.
    pub content: String,
    /// Tool calls emitted by an assistant message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Call id a tool message answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a text-only assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create an assistant message carrying tool calls.
    #[must_use]
    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    /// Create a tool-result message answering `call_id`.
    #[must_use]
    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }

    /// Whether this message carries at least one tool call.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|c| !c.is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str) -> ToolCall {
        let mut args = Map::new();
        let _ = args.insert("target".into(), json!("localhost"));
        ToolCall {
            id: id.into(),
            name: "resolve_target".into(),
            arguments: args,
        }
    }

    #[test]
    fn role_serde_is_snake_case() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        let back: Role = serde_json::from_str("\"tool\"").unwrap();
        assert_eq!(back, Role::Tool);
    }

    #[test]
    fn role_as_str_matches_serde() {
        for role in [Role::System, Role::User, Role::Assistant, Role::Tool] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
    }

    #[test]
    fn constructors_set_roles() {
        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::user("u").role, Role::User);
        assert_eq!(Message::assistant("a").role, Role::Assistant);
        assert_eq!(Message::tool("c1", "out").role, Role::Tool);
    }

    #[test]
    fn tool_message_carries_call_id() {
        let m = Message::tool("call_1", "output");
        assert_eq!(m.tool_call_id.as_deref(), Some("call_1"));
        assert!(!m.has_tool_calls());
    }

    #[test]
    fn assistant_with_calls_has_tool_calls() {
        let m = Message::assistant_with_calls("", vec![call("c1")]);
        assert!(m.has_tool_calls());
        assert!(m.content.is_empty());
    }

    #[test]
    fn empty_call_list_is_not_tool_calls() {
        let m = Message::assistant_with_calls("hi", vec![]);
        assert!(!m.has_tool_calls());
    }

    #[test]
    fn message_serde_roundtrip() {
        let m = Message::assistant_with_calls("thinking", vec![call("c1"), call("c2")]);
        let json = serde_json::to_value(&m).unwrap();
        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(m, back);
    }

    #[test]
    fn none_fields_are_omitted() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert!(json.get("tool_calls").is_none());
        assert!(json.get("tool_call_id").is_none());
    }
}
