//! Error types for the tool system.

use thiserror::Error;

use crate::backend::BackendError;

/// Errors raised by tools and the registry.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A tool with this name is already registered.
    #[error("tool already registered: {0}")]
    AlreadyRegistered(String),

    /// External registration rejected by plugin policy.
    #[error("plugin registration denied: {0}")]
    PluginDenied(String),

    /// Failure inside `execute`. Becomes a `tool_result(error)` — data,
    /// not an exception.
    #[error("tool execution failed: {message}")]
    Execution {
        /// What went wrong.
        message: String,
    },

    /// Typed failure from the execution backend.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Execution was cancelled cooperatively.
    #[error("tool execution cancelled")]
    Cancelled,
}

/// Convenience alias for tool results.
pub type Result<T> = std::result::Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_registered_display() {
        let err = ToolError::AlreadyRegistered("run_shell".into());
        assert_eq!(err.to_string(), "tool already registered: run_shell");
    }

    #[test]
    fn backend_error_converts() {
        let err: ToolError = BackendError::new("unknown target", "target_not_found").into();
        assert!(err.to_string().contains("unknown target"));
    }
}
