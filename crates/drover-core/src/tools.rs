//! Tool descriptors, risk levels, and result types.
//!
//! A [`ToolDefinition`] is the static description of a tool — name, schema,
//! risk and privacy classification. [`ToolResult`] is what an execution
//! returns to the model. Both sides of the policy engine (gating input and
//! audit output) are built from these types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Risk and privacy classification
// ─────────────────────────────────────────────────────────────────────────────

/// Ordinal risk classification of a tool.
///
/// Variants carry fixed integer levels (10/20/30/40) so configuration can
/// express a ceiling and the policy engine can compare with `>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Observes state only.
    ReadOnly,
    /// Mutates state in a recoverable way.
    Write,
    /// Mutates state in a hard-to-recover way.
    Destructive,
    /// Arbitrary shell access.
    Shell,
}

impl RiskLevel {
    /// Numeric level used in audit records and comparisons.
    #[must_use]
    pub fn level(self) -> u8 {
        match self {
            Self::ReadOnly => 10,
            Self::Write => 20,
            Self::Destructive => 30,
            Self::Shell => 40,
        }
    }

    /// Audit-record name (`READ_ONLY`, `WRITE`, ...).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "READ_ONLY",
            Self::Write => "WRITE",
            Self::Destructive => "DESTRUCTIVE",
            Self::Shell => "SHELL",
        }
    }
}

/// Privacy classification controlling audit redaction depth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyScope {
    /// Arguments and output may be audited after pattern redaction.
    #[default]
    Public,
    /// Arguments are fully redacted; output is pattern-redacted.
    Sensitive,
    /// Arguments and output are fully redacted.
    Secret,
}

/// Verdict of a policy evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Execute without interaction.
    Allow,
    /// Execute only after operator confirmation.
    Confirm,
    /// Do not execute.
    Deny,
}

impl Verdict {
    /// Wire string for this verdict.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Confirm => "confirm",
            Self::Deny => "deny",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool schema
// ─────────────────────────────────────────────────────────────────────────────

/// JSON Schema-compatible parameter definition for a tool.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolParameterSchema {
    /// Top-level JSON Schema type.
    #[serde(rename = "type", default)]
    pub schema_type: String,
    /// Property definitions (when type is `object`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    /// Required property names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Whether keys outside `properties` are accepted. Defaults to `false`
    /// after normalization — unknown keys are a hard error.
    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<bool>,
    /// Catch-all for additional JSON Schema keywords.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolParameterSchema {
    /// Build an object schema from a property map and required list.
    #[must_use]
    pub fn object(properties: Map<String, Value>, required: &[&str]) -> Self {
        Self {
            schema_type: "object".into(),
            properties: Some(properties),
            required: Some(required.iter().map(|s| (*s).to_owned()).collect()),
            additional_properties: None,
            extra: Map::new(),
        }
    }

    /// Normalized copy: `type` defaults to `object`, `additionalProperties`
    /// defaults to `false`.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut out = self.clone();
        if out.schema_type.is_empty() {
            out.schema_type = "object".into();
        }
        if out.additional_properties.is_none() {
            out.additional_properties = Some(false);
        }
        out
    }
}

/// Static descriptor of a tool, registered once at startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name — the exact string sent to/from the model.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Risk classification.
    pub risk: RiskLevel,
    /// Privacy classification.
    #[serde(default)]
    pub privacy_scope: PrivacyScope,
    /// JSON Schema for the tool's arguments.
    pub parameters: ToolParameterSchema,
}

impl ToolDefinition {
    /// Chat-completion function schema for this tool.
    #[must_use]
    pub fn openai_schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters.normalized(),
            }
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool results
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome status of a tool execution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    /// Execution succeeded.
    #[default]
    Ok,
    /// Execution failed; the error is data fed back to the model.
    Error,
    /// The policy engine (or the operator) refused execution.
    Denied,
}

impl ToolStatus {
    /// Wire string for this status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Denied => "denied",
        }
    }
}

/// Raw bytes a tool wants persisted in the artifact store.
///
/// The executor stores the payload, records its hash in `artifact_refs`,
/// and drops the bytes before the result event is appended.
#[derive(Clone, Debug, PartialEq)]
pub struct ArtifactPayload {
    /// Artifact content.
    pub content: Vec<u8>,
    /// MIME type of the content.
    pub media_type: String,
    /// Short description for runbook export.
    pub description: String,
}

/// Result of a tool execution, fed back to the model and persisted as a
/// `tool_result` event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Outcome status.
    pub status: ToolStatus,
    /// Structured output returned to the model.
    pub output: Value,
    /// SHA-256 hashes of artifacts stored alongside this result.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifact_refs: Vec<String>,
    /// Short machine-readable error code (`unknown_tool`, `timeout`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Artifacts pending storage. Never serialized; drained by the executor.
    #[serde(skip)]
    pub pending_artifacts: Vec<ArtifactPayload>,
}

impl ToolResult {
    /// Successful result with structured output.
    #[must_use]
    pub fn ok(output: Value) -> Self {
        Self {
            status: ToolStatus::Ok,
            output,
            ..Self::default()
        }
    }

    /// Failed result with an error code and detail message.
    #[must_use]
    pub fn error(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            output: json!({ "message": detail.into() }),
            error: Some(code.into()),
            ..Self::default()
        }
    }

    /// Denied result with the policy reason.
    #[must_use]
    pub fn denied(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            status: ToolStatus::Denied,
            output: json!({ "message": format!("denied by policy: {reason}") }),
            error: Some(reason),
            ..Self::default()
        }
    }

    /// Attach an artifact payload for the executor to persist.
    #[must_use]
    pub fn with_artifact(mut self, payload: ArtifactPayload) -> Self {
        self.pending_artifacts.push(payload);
        self
    }

    /// Whether the execution succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == ToolStatus::Ok
    }

    /// Text rendering of this result for a tool message.
    #[must_use]
    pub fn message_content(&self) -> String {
        match self.status {
            ToolStatus::Ok => match &self.output {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            ToolStatus::Error | ToolStatus::Denied => {
                let code = self.error.as_deref().unwrap_or("error");
                let detail = self
                    .output
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                format!("[{}: {code}] {detail}", self.status.as_str())
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
