//! Streaming tool-call assembler.
//!
//! Providers emit tool calls as per-slot fragments: an `index` identifying
//! the call slot, an `id` and `name` that may arrive once or in pieces,
//! and the argument JSON streamed as string chunks. The assembler
//! accumulates fragments per slot and, at stream end, either yields every
//! call complete and well-typed or rejects the whole stream with a
//! [`ProtocolError`].
//!
//! The model's control channel must be verifiable — a silently repaired
//! call is worse than a failed turn, so there is no best-effort recovery.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;
use tracing::debug;

use drover_core::chunks::ProviderChunk;
use drover_core::messages::ToolCall;

use crate::errors::ProtocolError;

/// Accumulator for one call slot.
#[derive(Clone, Debug, Default)]
struct Slot {
    id: Option<String>,
    name: String,
    args: String,
}

/// Buffers tool-call deltas and yields finished [`ToolCall`]s on
/// [`finish`](ToolCallAssembler::finish).
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    slots: BTreeMap<u32, Slot>,
}

impl ToolCallAssembler {
    /// Create an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one tool-call delta into the slot at `index`.
    ///
    /// The first non-empty `id` wins; `name` fragments concatenate; the
    /// argument JSON accumulates verbatim.
    pub fn feed(
        &mut self,
        index: u32,
        id: Option<&str>,
        name: Option<&str>,
        args_chunk: Option<&str>,
    ) {
        let slot = self.slots.entry(index).or_default();
        if slot.id.is_none() {
            if let Some(id) = id.filter(|s| !s.is_empty()) {
                slot.id = Some(id.to_owned());
            }
        }
        if let Some(name) = name {
            slot.name.push_str(name);
        }
        if let Some(chunk) = args_chunk {
            slot.args.push_str(chunk);
        }
    }

    /// Feed a provider chunk; non-tool chunks are ignored.
    pub fn feed_chunk(&mut self, chunk: &ProviderChunk) {
        if let ProviderChunk::ToolCallDelta {
            index,
            id,
            name,
            args_chunk,
        } = chunk
        {
            self.feed(*index, id.as_deref(), name.as_deref(), args_chunk.as_deref());
        }
    }

    /// Id and name of the slot at `index`, when both are known.
    #[must_use]
    pub fn slot_identity(&self, index: u32) -> Option<(&str, &str)> {
        let slot = self.slots.get(&index)?;
        let id = slot.id.as_deref()?;
        if slot.name.is_empty() {
            return None;
        }
        Some((id, slot.name.as_str()))
    }

    /// Whether any slot has been opened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Finalize all slots in index order.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::MissingIdentity`] — a slot lacks an id or name.
    /// - [`ProtocolError::MalformedArguments`] — a slot's accumulated
    ///   arguments do not parse as a JSON object. An empty buffer counts
    ///   as `{}` (a call with no arguments).
    /// - [`ProtocolError::DuplicateId`] — two slots share one id.
    pub fn finish(self) -> Result<Vec<ToolCall>, ProtocolError> {
        let mut calls = Vec::with_capacity(self.slots.len());
        let mut seen_ids: HashSet<String> = HashSet::new();

        for (index, slot) in self.slots {
            let Some(id) = slot.id.filter(|s| !s.is_empty()) else {
                return Err(ProtocolError::MissingIdentity { index });
            };
            let name = slot.name.trim().to_owned();
            if name.is_empty() {
                return Err(ProtocolError::MissingIdentity { index });
            }
            if !seen_ids.insert(id.clone()) {
                return Err(ProtocolError::DuplicateId { id });
            }

            let raw = if slot.args.trim().is_empty() {
                "{}"
            } else {
                slot.args.as_str()
            };
            let arguments = match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => map,
                Ok(other) => {
                    return Err(ProtocolError::MalformedArguments {
                        index,
                        message: format!("expected object, got {}", kind_of(&other)),
                    });
                }
                Err(e) => {
                    return Err(ProtocolError::MalformedArguments {
                        index,
                        message: e.to_string(),
                    });
                }
            };

            debug!(index, call_id = %id, tool = %name, "tool call assembled");
            calls.push(ToolCall {
                id,
                name,
                arguments,
            });
        }
        Ok(calls)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
