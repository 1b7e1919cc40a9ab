//! Error types for providers and the tool-call assembler.

use thiserror::Error;

/// Errors that can occur during provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Authentication failed or credentials are missing.
    #[error("auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// Provider returned an API error status.
    #[error("api error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
    },

    /// Request or stream exceeded the configured timeout.
    #[error("provider timeout after {seconds}s")]
    Timeout {
        /// Configured timeout.
        seconds: u64,
    },

    /// Provider-specific error.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl ProviderError {
    /// Whether a fresh attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Timeout { .. } => true,
            Self::Auth { .. } | Self::Json(_) | Self::Other { .. } => false,
        }
    }
}

/// Assembler rejection of a malformed tool-call stream.
///
/// There is no silent recovery: a malformed stream terminates the turn
/// rather than producing a best-effort partial call.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A call slot ended without a complete id and name.
    #[error("protocol_error: missing_identity (slot {index})")]
    MissingIdentity {
        /// Offending call slot.
        index: u32,
    },

    /// A call slot's accumulated arguments are not a JSON object.
    #[error("protocol_error: malformed_arguments (slot {index}): {message}")]
    MalformedArguments {
        /// Offending call slot.
        index: u32,
        /// Parse failure description.
        message: String,
    },

    /// Two call slots share one id.
    #[error("protocol_error: duplicate_id ({id})")]
    DuplicateId {
        /// The duplicated call id.
        id: String,
    },
}

/// Convenience alias for provider results.
pub type Result<T> = std::result::Result<T, ProviderError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
