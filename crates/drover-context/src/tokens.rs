//! Token counting.
//!
//! The packer counts through the [`TokenCounter`] trait so hosts can plug
//! an exact tokenizer for their model. The default [`HeuristicCounter`]
//! estimates roughly four characters per token, plus a small per-message
//! overhead for role markers and separators.

use drover_core::messages::Message;

/// Estimates token counts for text and messages.
pub trait TokenCounter: Send + Sync {
    /// Estimated token count for a plain string.
    fn count_text(&self, text: &str) -> u32;

    /// Estimated token count for one message, including tool calls and the
    /// tool-call id link.
    fn count_message(&self, message: &Message) -> u32 {
        // Per-message overhead: role, separators, priming.
        let mut tokens = 4 + self.count_text(&message.content);

        if let Some(calls) = &message.tool_calls {
            for call in calls {
                tokens += self.count_text(&call.name);
                let args = serde_json::to_string(&call.arguments).unwrap_or_default();
                tokens += self.count_text(&args);
            }
        }
        if let Some(id) = &message.tool_call_id {
            tokens += self.count_text(id);
        }
        tokens
    }
}

/// Character-based heuristic: ~4 characters per token.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn count_text(&self, text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }
        let chars = text.chars().count();
        ((chars / 4).max(1)) as u32
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::messages::ToolCall;
    use serde_json::json;

    #[test]
    fn empty_text_is_zero() {
        assert_eq!(HeuristicCounter.count_text(""), 0);
    }

    #[test]
    fn short_text_is_at_least_one() {
        assert_eq!(HeuristicCounter.count_text("ab"), 1);
    }

    #[test]
    fn four_chars_per_token() {
        assert_eq!(HeuristicCounter.count_text(&"x".repeat(400)), 100);
    }

    #[test]
    fn message_includes_overhead() {
        let tokens = HeuristicCounter.count_message(&Message::user(&"x".repeat(40)));
        assert_eq!(tokens, 4 + 10);
    }

    #[test]
    fn tool_calls_add_cost() {
        let call = ToolCall {
            id: "c1".into(),
            name: "resolve_target".into(),
            arguments: {
                let mut m = serde_json::Map::new();
                let _ = m.insert("target".into(), json!("localhost"));
                m
            },
        };
        let plain = HeuristicCounter.count_message(&Message::assistant(""));
        let with_call =
            HeuristicCounter.count_message(&Message::assistant_with_calls("", vec![call]));
        assert!(with_call > plain);
    }

    #[test]
    fn tool_call_id_adds_cost() {
        let without = HeuristicCounter.count_message(&Message::assistant("out"));
        let with = HeuristicCounter.count_message(&Message::tool("call_12345678", "out"));
        assert!(with > without);
    }
}
