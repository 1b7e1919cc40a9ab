//! Error types for the policy subsystem.

use thiserror::Error;

/// Errors raised by the policy engine and audit writer.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A configured regex failed to compile. Fatal at startup.
    #[error("invalid pattern {pattern:?}: {message}")]
    Pattern {
        /// The offending pattern.
        pattern: String,
        /// Compiler message.
        message: String,
    },

    /// Audit file could not be written or rotated.
    #[error("audit io error: {0}")]
    Io(#[from] std::io::Error),

    /// Audit record failed to serialize.
    #[error("audit serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for policy results.
pub type Result<T> = std::result::Result<T, PolicyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_error_display() {
        let err = PolicyError::Pattern {
            pattern: "([".into(),
            message: "unclosed group".into(),
        };
        assert!(err.to_string().contains("invalid pattern"));
        assert!(err.to_string().contains("unclosed group"));
    }
}
