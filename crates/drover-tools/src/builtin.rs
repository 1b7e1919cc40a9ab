//! Builtin diagnostic tools.
//!
//! Five tools bridge the backend interface into the registry:
//!
//! | tool | risk |
//! |---|---|
//! | `resolve_target` | READ_ONLY |
//! | `list_diagnostics` | READ_ONLY |
//! | `run_diagnostic` | WRITE |
//! | `run_shell` | SHELL |
//! | `summarize_artifact` | READ_ONLY |
//!
//! The target is always explicit per call, never implicit session state.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use drover_core::tools::{
    PrivacyScope, RiskLevel, ToolDefinition, ToolParameterSchema, ToolResult,
};
use drover_events::artifacts::{is_valid_hash, ArtifactStore};

use crate::backend::{BackendError, ExecutionBackend};
use crate::errors::ToolError;
use crate::registry::ToolRegistry;
use crate::traits::{AgentTool, ToolContext};

/// Register all builtin tools against one backend and artifact store.
pub fn register_builtin(
    registry: &mut ToolRegistry,
    backend: Arc<dyn ExecutionBackend>,
    artifacts: Arc<ArtifactStore>,
) -> Result<(), ToolError> {
    registry.register(Arc::new(ResolveTargetTool::new(backend.clone())))?;
    registry.register(Arc::new(ListDiagnosticsTool::new(backend.clone())))?;
    registry.register(Arc::new(RunDiagnosticTool::new(backend.clone())))?;
    registry.register(Arc::new(RunShellTool::new(backend)))?;
    registry.register(Arc::new(SummarizeArtifactTool::new(artifacts)))?;
    Ok(())
}

fn backend_error_result(e: &BackendError) -> ToolResult {
    ToolResult::error(format!("backend_error:{}", e.code), e.message.clone())
}

fn required_str<'a>(arguments: &'a Map<String, Value>, key: &str) -> Result<&'a str, ToolError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::Execution {
            message: format!("missing argument {key:?} after validation"),
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// resolve_target
// ─────────────────────────────────────────────────────────────────────────────

/// Resolve a target identifier to structured information.
pub struct ResolveTargetTool {
    backend: Arc<dyn ExecutionBackend>,
}

impl ResolveTargetTool {
    /// Wrap a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn ExecutionBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl AgentTool for ResolveTargetTool {
    fn name(&self) -> &str {
        "resolve_target"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "resolve_target".into(),
            description:
                "Resolve a target identifier (hostname, service name) to structured information."
                    .into(),
            risk: RiskLevel::ReadOnly,
            privacy_scope: PrivacyScope::Public,
            parameters: ToolParameterSchema::object(
                props(&[("target", json!({"type": "string", "description": "The target identifier to resolve."}))]),
                &["target"],
            ),
        }
    }

    async fn execute(
        &self,
        arguments: Map<String, Value>,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let target = required_str(&arguments, "target")?;
        match self.backend.resolve_target(target).await {
            Ok(info) => Ok(ToolResult::ok(info)),
            Err(e) => Ok(backend_error_result(&e)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// list_diagnostics
// ─────────────────────────────────────────────────────────────────────────────

/// List available diagnostics for a target.
pub struct ListDiagnosticsTool {
    backend: Arc<dyn ExecutionBackend>,
}

impl ListDiagnosticsTool {
    /// Wrap a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn ExecutionBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl AgentTool for ListDiagnosticsTool {
    fn name(&self) -> &str {
        "list_diagnostics"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "list_diagnostics".into(),
            description: "List all available diagnostic actions for a given target.".into(),
            risk: RiskLevel::ReadOnly,
            privacy_scope: PrivacyScope::Public,
            parameters: ToolParameterSchema::object(
                props(&[("target", json!({"type": "string", "description": "The target to list diagnostics for."}))]),
                &["target"],
            ),
        }
    }

    async fn execute(
        &self,
        arguments: Map<String, Value>,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let target = required_str(&arguments, "target")?;
        match self.backend.list_diagnostics(target).await {
            Ok(diags) => Ok(ToolResult::ok(json!({
                "target": target,
                "diagnostics": diags,
            }))),
            Err(e) => Ok(backend_error_result(&e)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// run_diagnostic
// ─────────────────────────────────────────────────────────────────────────────

/// Run a diagnostic action against a target.
pub struct RunDiagnosticTool {
    backend: Arc<dyn ExecutionBackend>,
}

impl RunDiagnosticTool {
    /// Wrap a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn ExecutionBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl AgentTool for RunDiagnosticTool {
    fn name(&self) -> &str {
        "run_diagnostic"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "run_diagnostic".into(),
            description:
                "Run a specific diagnostic action against a target. Target is always required."
                    .into(),
            risk: RiskLevel::Write,
            privacy_scope: PrivacyScope::Public,
            parameters: ToolParameterSchema::object(
                props(&[
                    ("action", json!({"type": "string", "description": "The diagnostic action to run (e.g. ping, dns_lookup)."})),
                    ("target", json!({"type": "string", "description": "The target to run the diagnostic against."})),
                    ("args", json!({"type": "object", "description": "Action-specific arguments."})),
                ]),
                &["action", "target"],
            ),
        }
    }

    async fn execute(
        &self,
        arguments: Map<String, Value>,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let action = required_str(&arguments, "action")?.to_owned();
        let target = required_str(&arguments, "target")?.to_owned();
        let extra = match arguments.get("args") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        match self.backend.run_diagnostic(&action, &target, &extra).await {
            Ok(result) => Ok(ToolResult::ok(result)),
            Err(e) => Ok(backend_error_result(&e)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// run_shell
// ─────────────────────────────────────────────────────────────────────────────

/// Execute a shell command on a target.
pub struct RunShellTool {
    backend: Arc<dyn ExecutionBackend>,
}

impl RunShellTool {
    /// Wrap a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn ExecutionBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl AgentTool for RunShellTool {
    fn name(&self) -> &str {
        "run_shell"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "run_shell".into(),
            description: "Execute a shell command on a target and return its output.".into(),
            risk: RiskLevel::Shell,
            privacy_scope: PrivacyScope::Public,
            parameters: ToolParameterSchema::object(
                props(&[
                    ("target", json!({"type": "string", "description": "The target to run the command on."})),
                    ("command", json!({"type": "string", "description": "The shell command to execute."})),
                ]),
                &["target", "command"],
            ),
        }
    }

    async fn execute(
        &self,
        arguments: Map<String, Value>,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let target = required_str(&arguments, "target")?;
        let command = required_str(&arguments, "command")?;
        match self.backend.run_shell(command, target).await {
            Ok(result) => Ok(ToolResult::ok(result)),
            Err(e) => Ok(backend_error_result(&e)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// summarize_artifact
// ─────────────────────────────────────────────────────────────────────────────

/// Retrieve a stored artifact and return a text preview.
pub struct SummarizeArtifactTool {
    artifacts: Arc<ArtifactStore>,
}

impl SummarizeArtifactTool {
    /// Wrap an artifact store.
    #[must_use]
    pub fn new(artifacts: Arc<ArtifactStore>) -> Self {
        Self { artifacts }
    }
}

const PREVIEW_BYTES: usize = 4_000;

#[async_trait]
impl AgentTool for SummarizeArtifactTool {
    fn name(&self) -> &str {
        "summarize_artifact"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "summarize_artifact".into(),
            description:
                "Retrieve a stored artifact by its SHA-256 hash and return a text preview of its contents."
                    .into(),
            risk: RiskLevel::ReadOnly,
            privacy_scope: PrivacyScope::Public,
            parameters: ToolParameterSchema::object(
                props(&[("sha256", json!({"type": "string", "description": "SHA-256 hash of the artifact."}))]),
                &["sha256"],
            ),
        }
    }

    async fn execute(
        &self,
        arguments: Map<String, Value>,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let sha = required_str(&arguments, "sha256")?;
        if !is_valid_hash(sha) {
            return Ok(ToolResult::error(
                "invalid_hash",
                format!("not a SHA-256 hex digest: {sha}"),
            ));
        }
        match self.artifacts.get(sha) {
            Ok(bytes) => {
                let preview = String::from_utf8_lossy(&bytes)
                    .chars()
                    .take(PREVIEW_BYTES)
                    .collect::<String>();
                Ok(ToolResult::ok(json!({
                    "sha256": sha,
                    "size_bytes": bytes.len(),
                    "preview": preview,
                })))
            }
            Err(e) => Ok(ToolResult::error("artifact_not_found", e.to_string())),
        }
    }
}

fn props(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.clone()))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
