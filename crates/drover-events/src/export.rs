//! Session export.
//!
//! Two formats:
//! - `events_jsonl` — one canonical JSON object per event, lossless; a
//!   reimport of the lines reproduces the same logical event stream.
//! - `runbook_markdown` — an operator-readable narrative of the session:
//!   prompts, assistant text, tool invocations and outcomes, policy
//!   decisions, errors.

use std::fmt::Write;

use serde_json::Value;

use crate::errors::{EventStoreError, Result};
use crate::store::SessionStore;
use crate::types::{EventType, SessionEvent};

/// Supported export formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    /// One JSON object per line.
    EventsJsonl,
    /// Markdown runbook.
    RunbookMarkdown,
}

impl ExportFormat {
    /// Parse a format name.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "events_jsonl" => Ok(Self::EventsJsonl),
            "runbook_markdown" => Ok(Self::RunbookMarkdown),
            other => Err(EventStoreError::UnknownFormat(other.to_owned())),
        }
    }
}

/// Export a session from the store in the requested format.
pub fn export(store: &SessionStore, session_id: &str, format: ExportFormat) -> Result<String> {
    let info = store
        .get_session(session_id)?
        .ok_or_else(|| EventStoreError::SessionNotFound(session_id.to_owned()))?;
    let events = store.read_events(session_id, None, None)?;
    match format {
        ExportFormat::EventsJsonl => export_jsonl(&events),
        ExportFormat::RunbookMarkdown => Ok(export_runbook(&info.session_id, &info.created_at, &events)),
    }
}

/// Serialize events as JSON lines.
pub fn export_jsonl(events: &[SessionEvent]) -> Result<String> {
    let mut out = String::new();
    for event in events {
        out.push_str(&serde_json::to_string(event)?);
        out.push('\n');
    }
    Ok(out)
}

/// Parse a JSONL export back into events.
pub fn import_jsonl(content: &str) -> Result<Vec<SessionEvent>> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Ok(serde_json::from_str(line)?))
        .collect()
}

/// Render events as a Markdown runbook.
#[must_use]
pub fn export_runbook(session_id: &str, created_at: &str, events: &[SessionEvent]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Session runbook — `{session_id}`");
    let _ = writeln!(out, "\nStarted: {created_at}\n");

    for event in events {
        let p = &event.payload;
        match event.event_type {
            EventType::UserPrompt => {
                let _ = writeln!(out, "## Operator ({})\n", event.timestamp);
                let _ = writeln!(out, "{}\n", str_field(p, "content"));
            }
            EventType::AssistantText => {
                let _ = writeln!(out, "## Assistant\n");
                let _ = writeln!(out, "{}\n", str_field(p, "content"));
            }
            EventType::AssistantToolCall => {
                let _ = writeln!(
                    out,
                    "- **Tool call** `{}` (`{}`): `{}`",
                    str_field(p, "tool_name"),
                    str_field(p, "call_id"),
                    p.get("arguments").cloned().unwrap_or(Value::Null),
                );
            }
            EventType::ToolResult => {
                let status = str_field(p, "status");
                let _ = writeln!(
                    out,
                    "- **Result** `{}` → {status}: `{}`",
                    str_field(p, "call_id"),
                    p.get("output").cloned().unwrap_or(Value::Null),
                );
                if let Some(refs) = p.get("artifact_refs").and_then(Value::as_array) {
                    for r in refs {
                        let _ = writeln!(out, "  - artifact `{r}`");
                    }
                }
            }
            EventType::PolicyDecision => {
                let _ = writeln!(
                    out,
                    "- **Policy** `{}` on `{}`: {} ({})",
                    str_field(p, "decision"),
                    str_field(p, "tool_name"),
                    str_field(p, "call_id"),
                    str_field(p, "reason"),
                );
            }
            EventType::Error => {
                let _ = writeln!(
                    out,
                    "- **Error** `{}`: {}",
                    str_field(p, "kind"),
                    str_field(p, "message"),
                );
            }
            EventType::SessionMeta => {
                let _ = writeln!(out, "- **Session** {p}");
            }
        }
    }
    out
}

fn str_field<'a>(payload: &'a Value, key: &str) -> &'a str {
    payload.get(key).and_then(Value::as_str).unwrap_or("")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
