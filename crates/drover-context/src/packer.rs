//! Token-budgeted context packer.
//!
//! Packing walks the conversation from the most recent message backward,
//! keeping whole messages until the budget is exhausted. An assistant
//! message that carries tool calls forms an atomic unit with its tool
//! result messages: either the whole unit fits or none of it is included.
//! Chat-completion endpoints reject orphaned tool-use either way around,
//! so pairing is never broken.
//!
//! The system prompt is always included and prepended; the result is in
//! chronological order.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use drover_core::messages::{Message, Role};

use crate::tokens::{HeuristicCounter, TokenCounter};

/// Budget arithmetic and kept/dropped accounting for one packing run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackReport {
    /// Total budget for the packed prompt.
    pub token_budget: u32,
    /// Tokens reserved for the model's response.
    pub reserve_tokens: u32,
    /// Cost of the serialized tool schemas.
    pub tool_schema_tokens: u32,
    /// Cost of the system prompt.
    pub system_prompt_tokens: u32,
    /// Cost of the kept conversation messages.
    pub message_tokens: u32,
    /// Messages kept (excluding the system message).
    pub kept_messages: usize,
    /// Messages dropped to fit the budget.
    pub dropped_messages: usize,
}

/// Packs a message list into a token budget.
pub struct ContextPacker {
    counter: Arc<dyn TokenCounter>,
}

impl Default for ContextPacker {
    fn default() -> Self {
        Self {
            counter: Arc::new(HeuristicCounter),
        }
    }
}

impl ContextPacker {
    /// Create a packer with a custom token counter.
    #[must_use]
    pub fn new(counter: Arc<dyn TokenCounter>) -> Self {
        Self { counter }
    }

    /// Fit `messages` into the budget.
    ///
    /// `tools_schema` is the serialized tool list sent with the request —
    /// the model "sees" it, so its cost is charged against the budget.
    /// Returns the packed list (system message first, then chronological)
    /// and a [`PackReport`].
    #[must_use]
    pub fn pack(
        &self,
        messages: &[Message],
        tools_schema: Option<&Value>,
        system_prompt: &str,
        token_budget: u32,
        reserve_tokens: u32,
    ) -> (Vec<Message>, PackReport) {
        let tool_schema_tokens = tools_schema
            .map(|t| self.counter.count_text(&t.to_string()))
            .unwrap_or(0);
        let system_prompt_tokens = self.counter.count_text(system_prompt);

        let budget = token_budget
            .saturating_sub(reserve_tokens)
            .saturating_sub(tool_schema_tokens)
            .saturating_sub(system_prompt_tokens);

        let units = group_units(messages);

        // Walk units newest-first, keeping whole units while they fit.
        let mut kept_units: Vec<usize> = Vec::new();
        let mut running: u32 = 0;
        for (idx, unit) in units.iter().enumerate().rev() {
            let cost: u32 = unit
                .indices
                .iter()
                .map(|&i| self.counter.count_message(&messages[i]))
                .sum();
            if running + cost <= budget {
                running += cost;
                kept_units.push(idx);
            } else {
                // Older units cannot displace newer ones; stop scanning.
                break;
            }
        }

        let mut kept_indices: Vec<usize> = kept_units
            .iter()
            .flat_map(|&u| units[u].indices.iter().copied())
            .collect();
        kept_indices.sort_unstable();

        let mut packed = Vec::with_capacity(kept_indices.len() + 1);
        packed.push(Message::system(system_prompt));
        packed.extend(kept_indices.iter().map(|&i| messages[i].clone()));

        let kept_messages = kept_indices.len();
        let dropped_messages = messages.len() - kept_messages;
        if dropped_messages > 0 {
            debug!(kept_messages, dropped_messages, "context truncated to fit budget");
        }

        let report = PackReport {
            token_budget,
            reserve_tokens,
            tool_schema_tokens,
            system_prompt_tokens,
            message_tokens: running,
            kept_messages,
            dropped_messages,
        };
        (packed, report)
    }
}

/// One atomic packing unit: a message index list that must be kept or
/// dropped together.
struct Unit {
    indices: Vec<usize>,
}

/// Group messages into units. An assistant message with tool calls absorbs
/// the tool messages answering its call ids; orphaned tool messages are
/// dropped outright.
fn group_units(messages: &[Message]) -> Vec<Unit> {
    let mut units: Vec<Unit> = Vec::new();
    let mut claimed: HashSet<usize> = HashSet::new();

    for (idx, message) in messages.iter().enumerate() {
        if claimed.contains(&idx) {
            continue;
        }
        if message.has_tool_calls() {
            let ids: HashSet<&str> = message
                .tool_calls
                .iter()
                .flatten()
                .map(|c| c.id.as_str())
                .collect();
            let mut indices = vec![idx];
            for (later, candidate) in messages.iter().enumerate().skip(idx + 1) {
                if candidate.role == Role::Tool
                    && candidate
                        .tool_call_id
                        .as_deref()
                        .is_some_and(|id| ids.contains(id))
                {
                    indices.push(later);
                    let _ = claimed.insert(later);
                }
            }
            units.push(Unit { indices });
        } else if message.role == Role::Tool {
            // Tool message whose assistant was not seen — orphaned; drop.
            continue;
        } else {
            units.push(Unit { indices: vec![idx] });
        }
    }
    units
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::messages::ToolCall;
    use serde_json::json;

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: "resolve_target".into(),
            arguments: serde_json::Map::new(),
        }
    }

    fn packer() -> ContextPacker {
        ContextPacker::default()
    }

    #[test]
    fn everything_fits_under_large_budget() {
        let messages = vec![
            Message::user("hello"),
            Message::assistant("hi"),
            Message::user("more"),
        ];
        let (packed, report) = packer().pack(&messages, None, "sys", 10_000, 100);
        assert_eq!(packed.len(), 4);
        assert_eq!(packed[0].role, Role::System);
        assert_eq!(report.dropped_messages, 0);
        assert_eq!(report.kept_messages, 3);
    }

    #[test]
    fn result_is_chronological() {
        let messages = vec![
            Message::user("first"),
            Message::assistant("second"),
            Message::user("third"),
        ];
        let (packed, _) = packer().pack(&messages, None, "sys", 10_000, 100);
        assert_eq!(packed[1].content, "first");
        assert_eq!(packed[2].content, "second");
        assert_eq!(packed[3].content, "third");
    }

    #[test]
    fn oldest_messages_drop_first() {
        let messages = vec![
            Message::user(&"old ".repeat(200)),
            Message::user(&"mid ".repeat(200)),
            Message::user("newest"),
        ];
        // Budget fits newest + mid only.
        let (packed, report) = packer().pack(&messages, None, "", 500, 10);
        assert!(report.dropped_messages >= 1);
        let contents: Vec<&str> = packed.iter().map(|m| m.content.as_str()).collect();
        assert!(contents.contains(&"newest"));
        assert!(!contents.iter().any(|c| c.starts_with("old ")));
    }

    #[test]
    fn tool_call_unit_is_atomic() {
        let big_result = "x".repeat(4_000);
        let messages = vec![
            Message::user("do it"),
            Message::assistant_with_calls("", vec![call("c1")]),
            Message::tool("c1", big_result),
            Message::user("newest"),
        ];
        // Budget too small for the call+result unit, big enough for the rest.
        let (packed, _) = packer().pack(&messages, None, "", 300, 10);
        let has_assistant_calls = packed.iter().any(Message::has_tool_calls);
        let has_tool_msg = packed.iter().any(|m| m.role == Role::Tool);
        // Either both present or both absent — never a dangling half.
        assert_eq!(has_assistant_calls, has_tool_msg);
        assert!(!has_assistant_calls, "oversized unit should be dropped whole");
        assert!(packed.iter().any(|m| m.content == "newest"));
    }

    #[test]
    fn paired_unit_kept_when_it_fits() {
        let messages = vec![
            Message::assistant_with_calls("", vec![call("c1"), call("c2")]),
            Message::tool("c1", "a"),
            Message::tool("c2", "b"),
        ];
        let (packed, _) = packer().pack(&messages, None, "", 10_000, 10);
        assert_eq!(packed.len(), 4);
        assert!(packed[1].has_tool_calls());
        assert_eq!(packed[2].role, Role::Tool);
        assert_eq!(packed[3].role, Role::Tool);
    }

    #[test]
    fn orphan_tool_messages_are_dropped() {
        let messages = vec![
            Message::tool("ghost", "orphaned result"),
            Message::user("hello"),
        ];
        let (packed, _) = packer().pack(&messages, None, "", 10_000, 10);
        assert!(packed.iter().all(|m| m.role != Role::Tool));
    }

    #[test]
    fn tool_schema_cost_shrinks_message_budget() {
        let messages = vec![Message::user(&"pad ".repeat(100))];
        let schema = json!([{"type": "function", "function": {"name": "x".repeat(2_000)}}]);
        let (_, with_schema) = packer().pack(&messages, Some(&schema), "", 600, 10);
        let (_, without) = packer().pack(&messages, None, "", 600, 10);
        assert!(with_schema.tool_schema_tokens > 0);
        assert_eq!(without.tool_schema_tokens, 0);
        assert!(with_schema.kept_messages <= without.kept_messages);
    }

    #[test]
    fn system_prompt_always_first() {
        let messages = vec![Message::user(&"pad ".repeat(5_000))];
        let (packed, _) = packer().pack(&messages, None, "you are drover", 100, 10);
        assert_eq!(packed[0].role, Role::System);
        assert_eq!(packed[0].content, "you are drover");
    }

    #[test]
    fn zero_budget_keeps_only_system() {
        let messages = vec![Message::user("hello")];
        let (packed, report) = packer().pack(&messages, None, "sys", 0, 0);
        assert_eq!(packed.len(), 1);
        assert_eq!(report.kept_messages, 0);
        assert_eq!(report.dropped_messages, 1);
    }
}
