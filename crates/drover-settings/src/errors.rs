//! Error types for configuration loading.

use thiserror::Error;

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Settings file could not be read.
    #[error("settings io error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file or override payload is not valid JSON.
    #[error("settings parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A value is structurally valid but semantically unusable.
    #[error("invalid setting: {message}")]
    Invalid {
        /// What is wrong and where.
        message: String,
    },
}

/// Convenience alias for settings results.
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_display() {
        let err = SettingsError::Invalid {
            message: "session.token_budget must be > 0".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid setting: session.token_budget must be > 0"
        );
    }

    #[test]
    fn json_error_wraps() {
        let inner = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = SettingsError::Json(inner);
        assert!(err.to_string().starts_with("settings parse error"));
    }
}
