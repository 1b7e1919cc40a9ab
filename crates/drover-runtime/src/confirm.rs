//! Operator confirmation seam.
//!
//! When the policy engine answers `confirm`, the orchestrator pauses and
//! asks the caller-supplied handler. No handler, a negative answer, or a
//! timeout are all treated as a refusal.

use async_trait::async_trait;

use drover_core::messages::ToolCall;

/// Asks the operator whether a gated tool call may run.
#[async_trait]
pub trait ConfirmationHandler: Send + Sync {
    /// `true` approves execution; `false` refuses it.
    async fn confirm(&self, tool_name: &str, call: &ToolCall) -> bool;
}

/// Handler that approves everything. Test and headless-automation use.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApproveAll;

#[async_trait]
impl ConfirmationHandler for ApproveAll {
    async fn confirm(&self, _tool_name: &str, _call: &ToolCall) -> bool {
        true
    }
}

/// Handler that refuses everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct DenyAll;

#[async_trait]
impl ConfirmationHandler for DenyAll {
    async fn confirm(&self, _tool_name: &str, _call: &ToolCall) -> bool {
        false
    }
}
