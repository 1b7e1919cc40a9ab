//! Session event model.
//!
//! Every step of a turn is recorded as a [`SessionEvent`]. Events are
//! immutable once appended; `seq` is assigned by the store inside the
//! insert transaction and is strictly increasing per session with no gaps.
//!
//! [`NewEvent`] is an event awaiting its sequence number. Factory methods
//! build the payload for each variant so call sites never hand-assemble
//! payload JSON.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use drover_core::messages::ToolCall;
use drover_core::tools::{ToolResult, Verdict};

/// The closed set of event variants in the session log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Operator input that opened the turn.
    UserPrompt,
    /// Assistant text output.
    AssistantText,
    /// One tool call requested by the assistant.
    AssistantToolCall,
    /// Outcome of a tool call, linked by `call_id`.
    ToolResult,
    /// Policy verdict for a tool call.
    PolicyDecision,
    /// Fatal turn error.
    Error,
    /// Session metadata change (e.g. provider switch).
    SessionMeta,
}

impl EventType {
    /// Storage string for this variant.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserPrompt => "user_prompt",
            Self::AssistantText => "assistant_text",
            Self::AssistantToolCall => "assistant_tool_call",
            Self::ToolResult => "tool_result",
            Self::PolicyDecision => "policy_decision",
            Self::Error => "error",
            Self::SessionMeta => "session_meta",
        }
    }

    /// Parse a storage string back into a variant.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user_prompt" => Some(Self::UserPrompt),
            "assistant_text" => Some(Self::AssistantText),
            "assistant_tool_call" => Some(Self::AssistantToolCall),
            "tool_result" => Some(Self::ToolResult),
            "policy_decision" => Some(Self::PolicyDecision),
            "error" => Some(Self::Error),
            "session_meta" => Some(Self::SessionMeta),
            _ => None,
        }
    }
}

/// An event that has been appended to a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Owning session.
    pub session_id: String,
    /// Per-session sequence number, assigned on append.
    pub seq: i64,
    /// Event variant.
    pub event_type: EventType,
    /// RFC 3339 UTC creation timestamp.
    pub timestamp: String,
    /// Variant-specific payload.
    pub payload: Value,
}

/// An event awaiting append. Timestamp is fixed at creation time.
#[derive(Clone, Debug, PartialEq)]
pub struct NewEvent {
    /// Event variant.
    pub event_type: EventType,
    /// RFC 3339 UTC creation timestamp.
    pub timestamp: String,
    /// Variant-specific payload.
    pub payload: Value,
}

impl NewEvent {
    fn new(event_type: EventType, payload: Value) -> Self {
        Self {
            event_type,
            timestamp: chrono::Utc::now().to_rfc3339(),
            payload,
        }
    }

    /// `user_prompt` — operator input.
    #[must_use]
    pub fn user_prompt(content: impl Into<String>) -> Self {
        Self::new(EventType::UserPrompt, json!({ "content": content.into() }))
    }

    /// `assistant_text` — assistant text, with the producing model when known.
    #[must_use]
    pub fn assistant_text(content: impl Into<String>, model: Option<&str>) -> Self {
        let mut payload = json!({ "content": content.into() });
        if let Some(model) = model {
            payload["model"] = json!(model);
        }
        Self::new(EventType::AssistantText, payload)
    }

    /// `assistant_tool_call` — one requested call.
    #[must_use]
    pub fn assistant_tool_call(call: &ToolCall) -> Self {
        Self::new(
            EventType::AssistantToolCall,
            json!({
                "call_id": call.id,
                "tool_name": call.name,
                "arguments": Value::Object(call.arguments.clone()),
            }),
        )
    }

    /// `tool_result` — outcome of a call.
    #[must_use]
    pub fn tool_result(call_id: &str, tool_name: &str, result: &ToolResult) -> Self {
        Self::new(
            EventType::ToolResult,
            json!({
                "call_id": call_id,
                "tool_name": tool_name,
                "status": result.status.as_str(),
                "output": result.output,
                "artifact_refs": result.artifact_refs,
                "error": result.error,
            }),
        )
    }

    /// `policy_decision` — verdict for a call, with redacted arguments.
    #[must_use]
    pub fn policy_decision(
        call_id: &str,
        tool_name: &str,
        verdict: Verdict,
        reason: &str,
        args_redacted: Value,
    ) -> Self {
        Self::new(
            EventType::PolicyDecision,
            json!({
                "call_id": call_id,
                "tool_name": tool_name,
                "decision": verdict.as_str(),
                "reason": reason,
                "args_redacted": args_redacted,
            }),
        )
    }

    /// `error` — fatal turn error.
    #[must_use]
    pub fn error(kind: &str, message: impl Into<String>) -> Self {
        Self::new(
            EventType::Error,
            json!({ "kind": kind, "message": message.into() }),
        )
    }

    /// `session_meta` — provider switch marker.
    #[must_use]
    pub fn provider_switch(from: &str, to: &str) -> Self {
        Self::new(
            EventType::SessionMeta,
            json!({ "key": "provider_switch", "from": from, "to": to }),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::tools::ToolResult;
    use serde_json::Map;

    #[test]
    fn event_type_round_trips_through_strings() {
        for et in [
            EventType::UserPrompt,
            EventType::AssistantText,
            EventType::AssistantToolCall,
            EventType::ToolResult,
            EventType::PolicyDecision,
            EventType::Error,
            EventType::SessionMeta,
        ] {
            assert_eq!(EventType::parse(et.as_str()), Some(et));
        }
        assert_eq!(EventType::parse("bogus"), None);
    }

    #[test]
    fn user_prompt_payload() {
        let e = NewEvent::user_prompt("hello");
        assert_eq!(e.event_type, EventType::UserPrompt);
        assert_eq!(e.payload["content"], "hello");
        assert!(!e.timestamp.is_empty());
    }

    #[test]
    fn assistant_text_with_model() {
        let e = NewEvent::assistant_text("hi", Some("gpt-4o"));
        assert_eq!(e.payload["model"], "gpt-4o");
    }

    #[test]
    fn assistant_text_without_model_omits_key() {
        let e = NewEvent::assistant_text("hi", None);
        assert!(e.payload.get("model").is_none());
    }

    #[test]
    fn tool_call_payload_carries_arguments() {
        let mut args = Map::new();
        let _ = args.insert("target".into(), json!("localhost"));
        let call = ToolCall {
            id: "c1".into(),
            name: "resolve_target".into(),
            arguments: args,
        };
        let e = NewEvent::assistant_tool_call(&call);
        assert_eq!(e.payload["call_id"], "c1");
        assert_eq!(e.payload["arguments"]["target"], "localhost");
    }

    #[test]
    fn tool_result_payload_shape() {
        let result = ToolResult::error("timeout", "too slow");
        let e = NewEvent::tool_result("c1", "run_shell", &result);
        assert_eq!(e.payload["status"], "error");
        assert_eq!(e.payload["error"], "timeout");
        assert_eq!(e.payload["call_id"], "c1");
    }

    #[test]
    fn policy_decision_payload_shape() {
        let e = NewEvent::policy_decision(
            "c1",
            "run_shell",
            Verdict::Deny,
            "risk_ceiling",
            json!({"command": "ls"}),
        );
        assert_eq!(e.payload["decision"], "deny");
        assert_eq!(e.payload["reason"], "risk_ceiling");
    }

    #[test]
    fn provider_switch_is_session_meta() {
        let e = NewEvent::provider_switch("openai-compat", "ollama");
        assert_eq!(e.event_type, EventType::SessionMeta);
        assert_eq!(e.payload["key"], "provider_switch");
    }
}
