//! Execution backend interface.
//!
//! Backends are the boundary to real infrastructure: resolving targets,
//! running diagnostics, executing shell commands. Builtin tools hold a
//! backend behind `Arc<dyn ExecutionBackend>` and wrap its typed errors
//! into tool results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Structured error from a backend operation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    /// Human-readable description.
    pub message: String,
    /// Machine-readable code (`target_not_found`, `unknown_diagnostic`,
    /// `not_supported`, ...).
    pub code: String,
}

impl BackendError {
    /// Construct a backend error.
    #[must_use]
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
        }
    }
}

/// Describes a single diagnostic action available for a target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticInfo {
    /// Action name (`ping`, `df`, ...).
    pub name: String,
    /// What the action does.
    pub description: String,
    /// Target kind it applies to (`host`, `service`).
    pub target_type: String,
    /// JSON Schema for action-specific arguments.
    #[serde(default)]
    pub parameters: Value,
}

/// Abstract interface over an execution environment.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Resolve a target identifier to structured info.
    async fn resolve_target(&self, target: &str) -> Result<Value, BackendError>;

    /// List available diagnostics for a target.
    async fn list_diagnostics(&self, target: &str) -> Result<Vec<DiagnosticInfo>, BackendError>;

    /// Run a diagnostic action against a target.
    async fn run_diagnostic(
        &self,
        action: &str,
        target: &str,
        args: &Map<String, Value>,
    ) -> Result<Value, BackendError>;

    /// Structured shell execution. Backends without shell access keep the
    /// default.
    async fn run_shell(&self, command: &str, target: &str) -> Result<Value, BackendError> {
        let _ = (command, target);
        Err(BackendError::new(
            "shell execution not supported by this backend",
            "not_supported",
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    struct NoShellBackend;

    #[async_trait]
    impl ExecutionBackend for NoShellBackend {
        async fn resolve_target(&self, _target: &str) -> Result<Value, BackendError> {
            Ok(Value::Null)
        }
        async fn list_diagnostics(
            &self,
            _target: &str,
        ) -> Result<Vec<DiagnosticInfo>, BackendError> {
            Ok(Vec::new())
        }
        async fn run_diagnostic(
            &self,
            _action: &str,
            _target: &str,
            _args: &Map<String, Value>,
        ) -> Result<Value, BackendError> {
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn run_shell_defaults_to_not_supported() {
        let err = NoShellBackend.run_shell("ls", "web-1").await.unwrap_err();
        assert_eq!(err.code, "not_supported");
    }

    #[test]
    fn backend_error_display() {
        let err = BackendError::new("unknown target: x", "target_not_found");
        assert_eq!(err.to_string(), "unknown target: x");
        assert_eq!(err.code, "target_not_found");
    }

    #[test]
    fn diagnostic_info_serde() {
        let info = DiagnosticInfo {
            name: "ping".into(),
            description: "Send ICMP ping".into(),
            target_type: "host".into(),
            parameters: serde_json::json!({"type": "object"}),
        };
        let json = serde_json::to_value(&info).unwrap();
        let back: DiagnosticInfo = serde_json::from_value(json).unwrap();
        assert_eq!(info, back);
    }
}
