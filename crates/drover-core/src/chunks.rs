//! Streaming chunk types.
//!
//! Two chunk families:
//!
//! - **[`ProviderChunk`]**: low-level streaming events from an LLM provider
//!   (text deltas, per-slot tool call deltas, done).
//! - **[`StreamChunk`]**: the orchestrator's output stream rendered by a UI
//!   (text, tool lifecycle, policy decisions, turn completion, errors).
//!
//! Both are transient — never persisted. The session log records events,
//! not chunks.

use serde::{Deserialize, Serialize};

use crate::messages::ToolCall;
use crate::tools::{ToolResult, Verdict};

// ─────────────────────────────────────────────────────────────────────────────
// ProviderChunk — LLM provider streaming
// ─────────────────────────────────────────────────────────────────────────────

/// Events emitted by a provider while streaming one completion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderChunk {
    /// Incremental assistant text.
    ContentDelta {
        /// Text fragment.
        text: String,
    },

    /// Incremental tool-call fragment for the call slot at `index`.
    ///
    /// Providers may send `id` and `name` once and then stream the argument
    /// JSON in chunks, or send everything in one delta.
    ToolCallDelta {
        /// Call slot index within the response.
        index: u32,
        /// Call id, if present in this fragment.
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Tool name fragment, if present.
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Argument JSON fragment, if present.
        #[serde(skip_serializing_if = "Option::is_none")]
        args_chunk: Option<String>,
    },

    /// Stream finished.
    Done {
        /// Provider finish reason (`stop`, `tool_calls`, ...).
        reason: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// StreamChunk — orchestrator output
// ─────────────────────────────────────────────────────────────────────────────

/// Chunks yielded by one orchestrator turn, in causal order with the
/// session log. The sequence is finite: it ends with `turn_complete` or a
/// fatal `error`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Incremental assistant text, forwarded as it arrives.
    TextDelta {
        /// Text fragment.
        text: String,
    },

    /// The model opened a tool call.
    ToolCallStarted {
        /// Call id.
        call_id: String,
        /// Tool name.
        name: String,
    },

    /// Incremental argument JSON for an open tool call.
    ToolCallArgumentsDelta {
        /// Call id.
        call_id: String,
        /// Argument JSON fragment.
        delta: String,
    },

    /// A tool call was fully assembled and validated by the assembler.
    ToolCallCompleted {
        /// The complete call.
        call: ToolCall,
    },

    /// A tool call finished its lifecycle (executed, denied, or failed).
    ToolResult {
        /// Call id.
        call_id: String,
        /// Tool name.
        name: String,
        /// The outcome.
        result: ToolResult,
    },

    /// The policy engine ruled on a tool call.
    PolicyDecision {
        /// Call id.
        call_id: String,
        /// Tool name.
        tool: String,
        /// The verdict.
        verdict: Verdict,
        /// Human-readable reason.
        reason: String,
    },

    /// The turn reached quiescence — the assistant answered with text only.
    TurnComplete,

    /// Fatal error; the turn terminates after this chunk.
    Error {
        /// Error kind (`provider_failure`, `protocol_error`, `cancelled`,
        /// `max_turns_exceeded`, `store_failure`).
        kind: String,
        /// Human-readable message.
        message: String,
    },
}

impl StreamChunk {
    /// Whether this chunk terminates the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TurnComplete | Self::Error { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_chunk_serde_tagged() {
        let chunk = ProviderChunk::ContentDelta { text: "hi".into() };
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["type"], "content_delta");
        assert_eq!(json["text"], "hi");
    }

    #[test]
    fn tool_call_delta_omits_absent_fields() {
        let chunk = ProviderChunk::ToolCallDelta {
            index: 0,
            id: None,
            name: None,
            args_chunk: Some("{\"a\":".into()),
        };
        let json = serde_json::to_value(&chunk).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("name").is_none());
        assert_eq!(json["args_chunk"], "{\"a\":");
    }

    #[test]
    fn provider_chunk_roundtrip() {
        let chunks = vec![
            ProviderChunk::ContentDelta { text: "a".into() },
            ProviderChunk::ToolCallDelta {
                index: 1,
                id: Some("c1".into()),
                name: Some("run_shell".into()),
                args_chunk: None,
            },
            ProviderChunk::Done {
                reason: "tool_calls".into(),
            },
        ];
        for chunk in chunks {
            let json = serde_json::to_value(&chunk).unwrap();
            let back: ProviderChunk = serde_json::from_value(json).unwrap();
            assert_eq!(chunk, back);
        }
    }

    #[test]
    fn stream_chunk_terminal_variants() {
        assert!(StreamChunk::TurnComplete.is_terminal());
        assert!(StreamChunk::Error {
            kind: "provider_failure".into(),
            message: "boom".into()
        }
        .is_terminal());
        assert!(!StreamChunk::TextDelta { text: "x".into() }.is_terminal());
    }

    #[test]
    fn stream_chunk_serde_shape() {
        let chunk = StreamChunk::PolicyDecision {
            call_id: "c1".into(),
            tool: "run_shell".into(),
            verdict: Verdict::Deny,
            reason: "risk_ceiling".into(),
        };
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["type"], "policy_decision");
        assert_eq!(json["verdict"], "deny");
    }

    #[test]
    fn tool_result_chunk_roundtrip() {
        let chunk = StreamChunk::ToolResult {
            call_id: "c1".into(),
            name: "resolve_target".into(),
            result: crate::tools::ToolResult::ok(json!({"os": "linux"})),
        };
        let json = serde_json::to_value(&chunk).unwrap();
        let back: StreamChunk = serde_json::from_value(json).unwrap();
        assert_eq!(chunk, back);
    }
}
