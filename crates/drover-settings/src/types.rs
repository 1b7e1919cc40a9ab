//! Settings type definitions with compiled defaults.
//!
//! Every section derives `serde` with `#[serde(default)]` so a partial
//! settings file only overrides the keys it names.

use serde::{Deserialize, Serialize};

use drover_core::tools::RiskLevel;

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// LLM provider configuration.
    pub llm: LlmSettings,
    /// Policy engine configuration.
    pub policy: PolicySettings,
    /// Session store and orchestrator configuration.
    pub session: SessionSettings,
    /// External tool loading.
    pub plugins: PluginSettings,
}

/// Provider configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Provider adapter identifier.
    pub name: String,
    /// Model name passed to the provider.
    pub model: String,
    /// Base URL of the chat-completion endpoint.
    pub api_base: String,
    /// **Name** of the environment variable holding the API key. The key
    /// itself never appears in configuration or logs.
    pub api_key_env: String,
    /// Maximum context window in tokens.
    pub max_context_tokens: u32,
    /// Maximum output tokens per completion.
    pub max_output_tokens: u32,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            name: "openai-compat".into(),
            model: "gpt-4o".into(),
            api_base: "https://api.openai.com/v1".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            max_context_tokens: 128_000,
            max_output_tokens: 4_096,
            timeout_seconds: 120,
        }
    }
}

/// Policy engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// Risk ceiling; calls above are denied outright.
    pub max_risk: RiskLevel,
    /// Require operator confirmation for `DESTRUCTIVE` tools.
    pub confirm_destructive: bool,
    /// Require operator confirmation for `SHELL` tools.
    pub confirm_shell: bool,
    /// Require operator confirmation for `WRITE` tools.
    pub confirm_write: bool,
    /// Regexes; a match against any argument value denies the call.
    pub blocked_patterns: Vec<String>,
    /// Regexes applied to audit records in addition to the built-in secret
    /// patterns.
    pub redaction_patterns: Vec<String>,
    /// Path of the JSONL audit log.
    pub audit_log_path: String,
    /// Rotate the audit log when it exceeds this size.
    pub audit_max_size_mb: u64,
    /// Number of rotated audit files to keep.
    pub audit_keep_files: u32,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            max_risk: RiskLevel::ReadOnly,
            confirm_destructive: true,
            confirm_shell: true,
            confirm_write: false,
            blocked_patterns: Vec::new(),
            redaction_patterns: Vec::new(),
            audit_log_path: format!("{}/audit.jsonl", default_base_dir()),
            audit_max_size_mb: 10,
            audit_keep_files: 5,
        }
    }
}

/// Session store and orchestrator configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Base directory holding `sessions.db` and `artifacts/`.
    pub base_dir: String,
    /// Upper bound for the packed context, in tokens.
    pub token_budget: u32,
    /// Tokens reserved for the model's response.
    pub reserve_tokens: u32,
    /// Upper bound for orchestrator tool round-trips per user turn.
    pub max_turns: u32,
    /// Per-tool execution timeout in seconds.
    pub tool_timeout_seconds: u64,
    /// How long to wait for an operator confirmation before treating it as
    /// a refusal.
    pub confirm_timeout_seconds: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            token_budget: 100_000,
            reserve_tokens: 4_096,
            max_turns: 20,
            tool_timeout_seconds: 30,
            confirm_timeout_seconds: 60,
        }
    }
}

/// External tool loading. Deny-by-default.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    /// Whether external tools may be registered at all.
    pub enabled: bool,
    /// Tool names allowed to register when `enabled` is true.
    pub allowlist: Vec<String>,
}

/// Default base directory (`$HOME/.drover`, `/tmp/.drover` without a home).
#[must_use]
pub fn default_base_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    format!("{home}/.drover")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_conservative() {
        let s = Settings::default();
        assert_eq!(s.policy.max_risk, RiskLevel::ReadOnly);
        assert!(s.policy.confirm_destructive);
        assert!(s.policy.confirm_shell);
        assert!(!s.policy.confirm_write);
        assert!(!s.plugins.enabled);
    }

    #[test]
    fn partial_json_only_overrides_named_keys() {
        let s: Settings =
            serde_json::from_str(r#"{"llm": {"model": "local-7b"}}"#).unwrap();
        assert_eq!(s.llm.model, "local-7b");
        assert_eq!(s.llm.name, "openai-compat");
        assert_eq!(s.session.max_turns, 20);
    }

    #[test]
    fn max_risk_parses_from_screaming_snake() {
        let s: Settings =
            serde_json::from_str(r#"{"policy": {"max_risk": "SHELL"}}"#).unwrap();
        assert_eq!(s.policy.max_risk, RiskLevel::Shell);
    }

    #[test]
    fn settings_serde_roundtrip() {
        let s = Settings::default();
        let json = serde_json::to_string(&s).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn base_dir_defaults_under_home() {
        assert!(default_base_dir().ends_with("/.drover"));
    }
}
