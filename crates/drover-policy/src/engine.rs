//! Policy engine — gating decisions over tool calls.
//!
//! [`PolicyEngine::evaluate`] is a pure function of `(tool, arguments)`
//! and the engine's configuration; [`PolicyEngine::record`] writes the
//! audit line. Rules run in a fixed order:
//!
//! 1. risk above the ceiling → deny (`risk_ceiling`)
//! 2. any argument value matches a blocked pattern → deny
//!    (`blocked_pattern`)
//! 3. `SHELL` risk with `confirm_shell` → confirm
//! 4. `DESTRUCTIVE` risk with `confirm_destructive` → confirm
//! 5. `WRITE` risk with `confirm_write` → confirm
//! 6. otherwise → allow

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use drover_core::tools::{PrivacyScope, RiskLevel, ToolDefinition, Verdict};

use crate::audit::{AuditRecord, AuditWriter};
use crate::errors::{PolicyError, Result};
use crate::redact::Redactor;

/// Engine configuration, mapped from `policy.*` settings by the host.
#[derive(Clone, Debug)]
pub struct PolicyOptions {
    /// Risk ceiling; calls above are denied.
    pub max_risk: RiskLevel,
    /// Confirm `DESTRUCTIVE` tools.
    pub confirm_destructive: bool,
    /// Confirm `SHELL` tools.
    pub confirm_shell: bool,
    /// Confirm `WRITE` tools.
    pub confirm_write: bool,
    /// Deny-list regexes matched against every string argument value.
    pub blocked_patterns: Vec<String>,
    /// Extra redaction regexes for audit records.
    pub redaction_patterns: Vec<String>,
}

impl Default for PolicyOptions {
    fn default() -> Self {
        Self {
            max_risk: RiskLevel::ReadOnly,
            confirm_destructive: true,
            confirm_shell: true,
            confirm_write: false,
            blocked_patterns: Vec::new(),
            redaction_patterns: Vec::new(),
        }
    }
}

/// Verdict plus the material persisted with it.
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyDecision {
    /// The verdict.
    pub verdict: Verdict,
    /// Machine-readable reason (`risk_ceiling`, `blocked_pattern`,
    /// `requires_confirmation`, `ok`).
    pub reason: String,
    /// Redacted copy of the arguments, safe to persist.
    pub args_redacted: Value,
}

/// The gating layer. Construct once at startup and share.
#[derive(Debug)]
pub struct PolicyEngine {
    options: PolicyOptions,
    blocked: Vec<Regex>,
    redactor: Redactor,
    audit: AuditWriter,
}

impl PolicyEngine {
    /// Build an engine, compiling all patterns up front.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Pattern`] for an uncompilable blocked or
    /// redaction pattern — configuration errors are fatal at startup.
    pub fn new(options: PolicyOptions, audit: AuditWriter) -> Result<Self> {
        let blocked = options
            .blocked_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| PolicyError::Pattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let redactor = Redactor::new(&options.redaction_patterns)?;
        Ok(Self {
            options,
            blocked,
            redactor,
            audit,
        })
    }

    /// Decide whether a call may execute. Pure — no side effects.
    #[must_use]
    pub fn evaluate(&self, tool: &ToolDefinition, arguments: &Map<String, Value>) -> PolicyDecision {
        let args_value = Value::Object(arguments.clone());
        let args_redacted = self.redact_args(tool, &args_value);

        if tool.risk > self.options.max_risk {
            debug!(tool = %tool.name, risk = tool.risk.as_str(), "denied by risk ceiling");
            return PolicyDecision {
                verdict: Verdict::Deny,
                reason: format!(
                    "risk_ceiling: {} > {}",
                    tool.risk.as_str(),
                    self.options.max_risk.as_str()
                ),
                args_redacted,
            };
        }

        if let Some(pattern) = self.first_blocked_match(&args_value) {
            debug!(tool = %tool.name, pattern = %pattern, "denied by blocked pattern");
            return PolicyDecision {
                verdict: Verdict::Deny,
                reason: "blocked_pattern".into(),
                args_redacted,
            };
        }

        let needs_confirm = (tool.risk >= RiskLevel::Shell && self.options.confirm_shell)
            || (tool.risk >= RiskLevel::Destructive && self.options.confirm_destructive)
            || (tool.risk >= RiskLevel::Write && self.options.confirm_write);
        if needs_confirm {
            return PolicyDecision {
                verdict: Verdict::Confirm,
                reason: "requires_confirmation".into(),
                args_redacted,
            };
        }

        PolicyDecision {
            verdict: Verdict::Allow,
            reason: "ok".into(),
            args_redacted,
        }
    }

    /// Write the audit record for a decision.
    pub fn record(
        &self,
        session_id: &str,
        call_id: &str,
        tool: &ToolDefinition,
        decision: &PolicyDecision,
    ) -> Result<()> {
        self.audit.write(&AuditRecord {
            ts: chrono::Utc::now().to_rfc3339(),
            session_id: session_id.to_owned(),
            call_id: call_id.to_owned(),
            tool: tool.name.clone(),
            risk: tool.risk.as_str().to_owned(),
            decision: decision.verdict.as_str().to_owned(),
            reason: decision.reason.clone(),
            args_redacted: decision.args_redacted.clone(),
        })
    }

    /// Redact output text for persistence, honoring the tool's privacy
    /// scope.
    #[must_use]
    pub fn redact_output(&self, tool: &ToolDefinition, output: &str) -> String {
        match tool.privacy_scope {
            PrivacyScope::Secret => "***REDACTED***".into(),
            PrivacyScope::Public | PrivacyScope::Sensitive => self.redactor.redact_str(output),
        }
    }

    fn redact_args(&self, tool: &ToolDefinition, args: &Value) -> Value {
        match tool.privacy_scope {
            PrivacyScope::Public => self.redactor.redact_value(args),
            PrivacyScope::Sensitive | PrivacyScope::Secret => Value::String("***REDACTED***".into()),
        }
    }

    /// First blocked pattern matching any string value in the tree.
    fn first_blocked_match(&self, args: &Value) -> Option<&Regex> {
        if self.blocked.is_empty() {
            return None;
        }
        let mut stack = vec![args];
        while let Some(value) = stack.pop() {
            match value {
                Value::String(s) => {
                    if let Some(regex) = self.blocked.iter().find(|r| r.is_match(s)) {
                        return Some(regex);
                    }
                }
                Value::Array(items) => stack.extend(items.iter()),
                Value::Object(map) => stack.extend(map.values()),
                _ => {}
            }
        }
        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::tools::ToolParameterSchema;
    use serde_json::json;

    fn tool(risk: RiskLevel) -> ToolDefinition {
        ToolDefinition {
            name: "test_tool".into(),
            description: "A tool".into(),
            risk,
            privacy_scope: PrivacyScope::Public,
            parameters: ToolParameterSchema::default(),
        }
    }

    fn args(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    fn engine(options: PolicyOptions) -> (tempfile::TempDir, PolicyEngine) {
        let dir = tempfile::tempdir().unwrap();
        let audit =
            AuditWriter::new(&dir.path().join("audit.jsonl"), 1024 * 1024, 3).unwrap();
        let engine = PolicyEngine::new(options, audit).unwrap();
        (dir, engine)
    }

    #[test]
    fn risk_above_ceiling_is_denied() {
        let (_dir, engine) = engine(PolicyOptions::default());
        let decision = engine.evaluate(&tool(RiskLevel::Shell), &args(&[]));
        assert_eq!(decision.verdict, Verdict::Deny);
        assert!(decision.reason.starts_with("risk_ceiling"));
    }

    #[test]
    fn risk_at_ceiling_is_not_denied() {
        let (_dir, engine) = engine(PolicyOptions {
            max_risk: RiskLevel::Shell,
            confirm_shell: false,
            ..Default::default()
        });
        let decision = engine.evaluate(&tool(RiskLevel::Shell), &args(&[]));
        assert_eq!(decision.verdict, Verdict::Allow);
    }

    #[test]
    fn blocked_pattern_denies_before_confirmation() {
        let (_dir, engine) = engine(PolicyOptions {
            max_risk: RiskLevel::Shell,
            blocked_patterns: vec![r"rm\s+-rf".into()],
            ..Default::default()
        });
        let decision = engine.evaluate(
            &tool(RiskLevel::Shell),
            &args(&[("command", json!("rm -rf /"))]),
        );
        assert_eq!(decision.verdict, Verdict::Deny);
        assert_eq!(decision.reason, "blocked_pattern");
    }

    #[test]
    fn blocked_pattern_scans_nested_values() {
        let (_dir, engine) = engine(PolicyOptions {
            max_risk: RiskLevel::Shell,
            confirm_shell: false,
            blocked_patterns: vec!["forbidden".into()],
            ..Default::default()
        });
        let decision = engine.evaluate(
            &tool(RiskLevel::ReadOnly),
            &args(&[("nested", json!({"deep": ["ok", "forbidden thing"]}))]),
        );
        assert_eq!(decision.verdict, Verdict::Deny);
    }

    #[test]
    fn shell_requires_confirmation() {
        let (_dir, engine) = engine(PolicyOptions {
            max_risk: RiskLevel::Shell,
            ..Default::default()
        });
        let decision = engine.evaluate(&tool(RiskLevel::Shell), &args(&[]));
        assert_eq!(decision.verdict, Verdict::Confirm);
        assert_eq!(decision.reason, "requires_confirmation");
    }

    #[test]
    fn destructive_requires_confirmation() {
        let (_dir, engine) = engine(PolicyOptions {
            max_risk: RiskLevel::Shell,
            confirm_shell: false,
            ..Default::default()
        });
        let decision = engine.evaluate(&tool(RiskLevel::Destructive), &args(&[]));
        assert_eq!(decision.verdict, Verdict::Confirm);
    }

    #[test]
    fn write_confirmation_is_opt_in() {
        let (_dir, lenient) = engine(PolicyOptions {
            max_risk: RiskLevel::Shell,
            confirm_destructive: false,
            confirm_shell: false,
            ..Default::default()
        });
        assert_eq!(
            lenient.evaluate(&tool(RiskLevel::Write), &args(&[])).verdict,
            Verdict::Allow
        );

        let (_dir2, strict) = engine(PolicyOptions {
            max_risk: RiskLevel::Shell,
            confirm_destructive: false,
            confirm_shell: false,
            confirm_write: true,
            ..Default::default()
        });
        assert_eq!(
            strict.evaluate(&tool(RiskLevel::Write), &args(&[])).verdict,
            Verdict::Confirm
        );
    }

    #[test]
    fn read_only_is_allowed_by_default() {
        let (_dir, engine) = engine(PolicyOptions::default());
        let decision = engine.evaluate(&tool(RiskLevel::ReadOnly), &args(&[]));
        assert_eq!(decision.verdict, Verdict::Allow);
        assert_eq!(decision.reason, "ok");
    }

    #[test]
    fn decision_args_are_redacted() {
        let (_dir, engine) = engine(PolicyOptions::default());
        let decision = engine.evaluate(
            &tool(RiskLevel::ReadOnly),
            &args(&[("token", json!("sk-abcdefghijklmnopqrstu"))]),
        );
        assert!(!decision.args_redacted.to_string().contains("sk-abcdef"));
    }

    #[test]
    fn sensitive_scope_redacts_args_entirely() {
        let (_dir, engine) = engine(PolicyOptions::default());
        let mut t = tool(RiskLevel::ReadOnly);
        t.privacy_scope = PrivacyScope::Sensitive;
        let decision = engine.evaluate(&t, &args(&[("query", json!("select 1"))]));
        assert_eq!(decision.args_redacted, json!("***REDACTED***"));
    }

    #[test]
    fn secret_scope_redacts_output_entirely() {
        let (_dir, engine) = engine(PolicyOptions::default());
        let mut t = tool(RiskLevel::ReadOnly);
        t.privacy_scope = PrivacyScope::Secret;
        assert_eq!(engine.redact_output(&t, "anything at all"), "***REDACTED***");
    }

    #[test]
    fn record_writes_audit_line() {
        let dir = tempfile::tempdir().unwrap();
        let audit_path = dir.path().join("audit.jsonl");
        let audit = AuditWriter::new(&audit_path, 1024 * 1024, 3).unwrap();
        let engine = PolicyEngine::new(PolicyOptions::default(), audit).unwrap();

        let t = tool(RiskLevel::ReadOnly);
        let decision = engine.evaluate(&t, &args(&[("target", json!("web-1"))]));
        engine.record("s1", "c1", &t, &decision).unwrap();

        let content = std::fs::read_to_string(&audit_path).unwrap();
        let record: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(record["call_id"], "c1");
        assert_eq!(record["decision"], "allow");
        assert_eq!(record["risk"], "READ_ONLY");
        assert_eq!(record["args_redacted"]["target"], "web-1");
    }

    #[test]
    fn invalid_blocked_pattern_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditWriter::new(&dir.path().join("a.jsonl"), 1024, 2).unwrap();
        let err = PolicyEngine::new(
            PolicyOptions {
                blocked_patterns: vec!["([".into()],
                ..Default::default()
            },
            audit,
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::Pattern { .. }));
    }
}
