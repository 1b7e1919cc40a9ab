//! The tool trait and execution context.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use drover_core::tools::{ToolDefinition, ToolResult};

use crate::errors::ToolError;

/// Execution context passed to every tool invocation.
#[derive(Clone, Debug)]
pub struct ToolContext {
    /// Session the call belongs to.
    pub session_id: String,
    /// Unique id of this tool call.
    pub tool_call_id: String,
    /// Cancellation token for cooperative cancellation.
    pub cancellation: CancellationToken,
}

impl ToolContext {
    /// Context for a call within a session.
    #[must_use]
    pub fn new(session_id: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            tool_call_id: tool_call_id.into(),
            cancellation: CancellationToken::new(),
        }
    }
}

/// The trait every tool implements.
///
/// Arguments reaching [`execute`](AgentTool::execute) have already passed
/// schema validation and the policy engine — tools never re-validate.
/// Failures are returned as errors and become `tool_result(error)` data
/// fed back to the model.
#[async_trait]
pub trait AgentTool: Send + Sync {
    /// Tool name — the exact string sent to/from the model.
    fn name(&self) -> &str;

    /// Static descriptor: schema, risk, privacy scope.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with validated arguments.
    async fn execute(
        &self,
        arguments: Map<String, Value>,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
