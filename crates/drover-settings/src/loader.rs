//! Settings loading with deep merge and layered overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`Settings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `DROVER_*` environment variable overrides
//! 4. Apply caller overrides (a JSON object deep-merged last)
//!
//! Deep merge rules:
//! - Objects merge recursively (source overrides target per key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use drover_core::tools::RiskLevel;

use crate::errors::{Result, SettingsError};
use crate::types::{default_base_dir, Settings};

/// Resolve the path to the settings file (`~/.drover/settings.json`).
#[must_use]
pub fn settings_path() -> PathBuf {
    PathBuf::from(default_base_dir()).join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<Settings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields the defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<Settings> {
    let defaults = serde_json::to_value(Settings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: Settings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Deep-merge a JSON object of caller overrides into existing settings.
///
/// The same mechanism serves per-session overrides; callers apply them in
/// precedence order (caller first, per-session last).
pub fn with_overrides(settings: &Settings, overrides: &Value) -> Result<Settings> {
    let base = serde_json::to_value(settings)?;
    let merged = deep_merge(base, overrides.clone());
    let out: Settings = serde_json::from_value(merged)?;
    validate(&out)?;
    Ok(out)
}

/// Recursive deep merge of two JSON values.
#[must_use]
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `DROVER_*` environment variable overrides.
///
/// Parsing is strict: values that fail to parse are ignored with a debug
/// log, falling back to the file/default value.
pub fn apply_env_overrides(settings: &mut Settings) {
    // ── LLM ─────────────────────────────────────────────────────────
    if let Some(v) = read_env_string("DROVER_LLM_NAME") {
        settings.llm.name = v;
    }
    if let Some(v) = read_env_string("DROVER_LLM_MODEL") {
        settings.llm.model = v;
    }
    if let Some(v) = read_env_string("DROVER_LLM_API_BASE") {
        settings.llm.api_base = v;
    }
    if let Some(v) = read_env_string("DROVER_LLM_API_KEY_ENV") {
        settings.llm.api_key_env = v;
    }
    if let Some(v) = read_env_u32("DROVER_LLM_MAX_CONTEXT", 1, u32::MAX) {
        settings.llm.max_context_tokens = v;
    }
    if let Some(v) = read_env_u32("DROVER_LLM_MAX_OUTPUT", 1, u32::MAX) {
        settings.llm.max_output_tokens = v;
    }
    if let Some(v) = read_env_u64("DROVER_LLM_TIMEOUT", 1, 3_600) {
        settings.llm.timeout_seconds = v;
    }

    // ── Policy ──────────────────────────────────────────────────────
    if let Some(v) = read_env_risk("DROVER_POLICY_MAX_RISK") {
        settings.policy.max_risk = v;
    }
    if let Some(v) = read_env_bool("DROVER_POLICY_CONFIRM_DESTRUCTIVE") {
        settings.policy.confirm_destructive = v;
    }
    if let Some(v) = read_env_bool("DROVER_POLICY_CONFIRM_SHELL") {
        settings.policy.confirm_shell = v;
    }
    if let Some(v) = read_env_bool("DROVER_POLICY_CONFIRM_WRITE") {
        settings.policy.confirm_write = v;
    }
    if let Some(v) = read_env_list("DROVER_POLICY_BLOCKED") {
        settings.policy.blocked_patterns = v;
    }
    if let Some(v) = read_env_list("DROVER_POLICY_REDACTION") {
        settings.policy.redaction_patterns = v;
    }
    if let Some(v) = read_env_string("DROVER_POLICY_AUDIT_PATH") {
        settings.policy.audit_log_path = v;
    }
    if let Some(v) = read_env_u64("DROVER_POLICY_AUDIT_SIZE_MB", 1, 10_240) {
        settings.policy.audit_max_size_mb = v;
    }
    if let Some(v) = read_env_u32("DROVER_POLICY_AUDIT_KEEP", 1, 1_000) {
        settings.policy.audit_keep_files = v;
    }

    // ── Session ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("DROVER_SESSION_BASE_DIR") {
        settings.session.base_dir = v;
    }
    if let Some(v) = read_env_u32("DROVER_SESSION_TOKEN_BUDGET", 1, u32::MAX) {
        settings.session.token_budget = v;
    }
    if let Some(v) = read_env_u32("DROVER_SESSION_RESERVE_TOKENS", 0, u32::MAX) {
        settings.session.reserve_tokens = v;
    }
    if let Some(v) = read_env_u32("DROVER_SESSION_MAX_TURNS", 1, 10_000) {
        settings.session.max_turns = v;
    }
    if let Some(v) = read_env_u64("DROVER_SESSION_TOOL_TIMEOUT", 1, 86_400) {
        settings.session.tool_timeout_seconds = v;
    }
    if let Some(v) = read_env_u64("DROVER_SESSION_CONFIRM_TIMEOUT", 1, 86_400) {
        settings.session.confirm_timeout_seconds = v;
    }

    // ── Plugins ─────────────────────────────────────────────────────
    if let Some(v) = read_env_bool("DROVER_PLUGINS_ENABLED") {
        settings.plugins.enabled = v;
    }
    if let Some(v) = read_env_list("DROVER_PLUGINS_ALLOWLIST") {
        settings.plugins.allowlist = v;
    }
}

fn validate(settings: &Settings) -> Result<()> {
    if settings.session.token_budget <= settings.session.reserve_tokens {
        return Err(SettingsError::Invalid {
            message: format!(
                "session.token_budget ({}) must exceed session.reserve_tokens ({})",
                settings.session.token_budget, settings.session.reserve_tokens
            ),
        });
    }
    if settings.llm.api_base.is_empty() {
        return Err(SettingsError::Invalid {
            message: "llm.api_base must not be empty".into(),
        });
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Env parsing helpers
// ─────────────────────────────────────────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        other => {
            debug!(name, value = other, "ignoring unparseable boolean env var");
            None
        }
    }
}

fn read_env_u32(name: &str, min: u32, max: u32) -> Option<u32> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<u32>() {
        Ok(v) if v >= min && v <= max => Some(v),
        _ => {
            debug!(name, value = %raw, "ignoring out-of-range integer env var");
            None
        }
    }
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<u64>() {
        Ok(v) if v >= min && v <= max => Some(v),
        _ => {
            debug!(name, value = %raw, "ignoring out-of-range integer env var");
            None
        }
    }
}

fn read_env_list(name: &str) -> Option<Vec<String>> {
    let raw = std::env::var(name).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();
    Some(items)
}

fn read_env_risk(name: &str) -> Option<RiskLevel> {
    let raw = std::env::var(name).ok()?;
    match raw.to_ascii_uppercase().as_str() {
        "READ_ONLY" => Some(RiskLevel::ReadOnly),
        "WRITE" => Some(RiskLevel::Write),
        "DESTRUCTIVE" => Some(RiskLevel::Destructive),
        "SHELL" => Some(RiskLevel::Shell),
        other => {
            debug!(name, value = other, "ignoring unknown risk level env var");
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Tests that read or write process env must not interleave.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn deep_merge_objects_recursively() {
        let target = json!({"a": {"x": 1, "y": 2}, "b": 3});
        let source = json!({"a": {"y": 20}});
        let merged = deep_merge(target, source);
        assert_eq!(merged, json!({"a": {"x": 1, "y": 20}, "b": 3}));
    }

    #[test]
    fn deep_merge_replaces_arrays() {
        let target = json!({"list": [1, 2, 3]});
        let source = json!({"list": [9]});
        assert_eq!(deep_merge(target, source), json!({"list": [9]}));
    }

    #[test]
    fn deep_merge_skips_nulls() {
        let target = json!({"a": 1});
        let source = json!({"a": null, "b": 2});
        assert_eq!(deep_merge(target, source), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let settings =
            load_settings_from_path(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn file_overrides_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"session": {"max_turns": 3}, "policy": {"max_risk": "WRITE"}}"#,
        )
        .unwrap();
        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.session.max_turns, 3);
        assert_eq!(settings.policy.max_risk, RiskLevel::Write);
        // untouched keys keep their defaults
        assert_eq!(settings.llm.name, "openai-compat");
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_settings_from_path(&path).is_err());
    }

    #[test]
    fn budget_must_exceed_reserve() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"session": {"token_budget": 100, "reserve_tokens": 200}}"#,
        )
        .unwrap();
        let err = load_settings_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("token_budget"));
    }

    #[test]
    fn caller_overrides_win_over_file_values() {
        let settings = Settings::default();
        let out = with_overrides(
            &settings,
            &json!({"llm": {"model": "override-model"}, "session": {"max_turns": 2}}),
        )
        .unwrap();
        assert_eq!(out.llm.model, "override-model");
        assert_eq!(out.session.max_turns, 2);
    }

    #[test]
    fn env_overrides_apply() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("DROVER_SESSION_MAX_TURNS", "7");
        std::env::set_var("DROVER_POLICY_MAX_RISK", "shell");
        std::env::set_var("DROVER_POLICY_BLOCKED", "rm -rf, secret");
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings);
        std::env::remove_var("DROVER_SESSION_MAX_TURNS");
        std::env::remove_var("DROVER_POLICY_MAX_RISK");
        std::env::remove_var("DROVER_POLICY_BLOCKED");

        assert_eq!(settings.session.max_turns, 7);
        assert_eq!(settings.policy.max_risk, RiskLevel::Shell);
        assert_eq!(
            settings.policy.blocked_patterns,
            vec!["rm -rf".to_owned(), "secret".to_owned()]
        );
    }

    #[test]
    fn session_budget_and_timeout_env_overrides_apply() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("DROVER_SESSION_RESERVE_TOKENS", "2048");
        std::env::set_var("DROVER_SESSION_CONFIRM_TIMEOUT", "15");
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings);
        std::env::remove_var("DROVER_SESSION_RESERVE_TOKENS");
        std::env::remove_var("DROVER_SESSION_CONFIRM_TIMEOUT");

        assert_eq!(settings.session.reserve_tokens, 2_048);
        assert_eq!(settings.session.confirm_timeout_seconds, 15);
    }

    #[test]
    fn unparseable_env_values_are_ignored() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("DROVER_LLM_TIMEOUT", "not-a-number");
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings);
        std::env::remove_var("DROVER_LLM_TIMEOUT");
        assert_eq!(settings.llm.timeout_seconds, 120);
    }
}
