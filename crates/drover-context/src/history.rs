//! Event log → message list derivation.
//!
//! Maps event variants to chat-completion messages:
//!
//! - `user_prompt` → one user message
//! - `assistant_text` → one assistant message with no tool calls
//! - consecutive `assistant_tool_call` events → one assistant message whose
//!   tool-call list equals all calls emitted in that turn
//! - `tool_result` → one tool message linked by call id
//!
//! `policy_decision`, `error`, and `session_meta` events are log metadata;
//! they do not map to messages.

use serde_json::{Map, Value};
use tracing::warn;

use drover_core::messages::{Message, ToolCall};
use drover_events::types::{EventType, SessionEvent};

/// Derive the ordered message list from a session's events.
#[must_use]
pub fn derive_messages(events: &[SessionEvent]) -> Vec<Message> {
    let mut messages: Vec<Message> = Vec::new();
    let mut pending_calls: Vec<ToolCall> = Vec::new();

    for event in events {
        match event.event_type {
            EventType::UserPrompt => {
                flush_pending(&mut messages, &mut pending_calls);
                messages.push(Message::user(str_field(&event.payload, "content")));
            }
            EventType::AssistantText => {
                flush_pending(&mut messages, &mut pending_calls);
                messages.push(Message::assistant(str_field(&event.payload, "content")));
            }
            EventType::AssistantToolCall => {
                match parse_call(&event.payload) {
                    Some(call) => pending_calls.push(call),
                    None => warn!(seq = event.seq, "malformed assistant_tool_call payload"),
                }
            }
            EventType::ToolResult => {
                flush_pending(&mut messages, &mut pending_calls);
                let call_id = str_field(&event.payload, "call_id");
                messages.push(Message::tool(call_id, result_content(&event.payload)));
            }
            EventType::PolicyDecision | EventType::Error | EventType::SessionMeta => {}
        }
    }

    flush_pending(&mut messages, &mut pending_calls);
    messages
}

/// Materialize accumulated tool calls as one assistant message.
///
/// All calls of a turn share a single assistant message; chat-completion
/// endpoints require tool calls to hang off an assistant message, and
/// reject a tool message whose call has no such anchor.
fn flush_pending(messages: &mut Vec<Message>, pending: &mut Vec<ToolCall>) {
    if pending.is_empty() {
        return;
    }
    let calls = std::mem::take(pending);
    messages.push(Message::assistant_with_calls("", calls));
}

fn parse_call(payload: &Value) -> Option<ToolCall> {
    let id = payload.get("call_id")?.as_str()?.to_owned();
    let name = payload.get("tool_name")?.as_str()?.to_owned();
    let arguments: Map<String, Value> = match payload.get("arguments") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    Some(ToolCall { id, name, arguments })
}

/// Text a tool message carries back to the model.
fn result_content(payload: &Value) -> String {
    let status = str_field(payload, "status");
    if status == "ok" {
        match payload.get("output") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    } else {
        let code = payload
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("error");
        let detail = payload
            .get("output")
            .and_then(|o| o.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("");
        format!("[{status}: {code}] {detail}")
    }
}

fn str_field<'a>(payload: &'a Value, key: &str) -> &'a str {
    payload.get(key).and_then(Value::as_str).unwrap_or("")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
