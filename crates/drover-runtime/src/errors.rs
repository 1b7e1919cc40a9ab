//! Error types for the orchestrator.
//!
//! Errors inside a tool are data (they flow back to the model as tool
//! results); errors in the orchestrator machinery itself surface to the
//! caller as a terminal `error` chunk and end the turn. [`StopKind`] is
//! the wire name of that terminal kind.

use thiserror::Error;

use drover_events::EventStoreError;
use drover_llm::{ProtocolError, ProviderError};

/// Fatal turn failures.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Provider transport, auth, or server-side failure.
    #[error("provider failure: {0}")]
    Provider(#[from] ProviderError),

    /// The assembler rejected the tool-call stream.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    /// Event store append/read failure.
    #[error("store failure: {0}")]
    Store(#[from] EventStoreError),

    /// The caller cancelled the turn.
    #[error("turn cancelled")]
    Cancelled,

    /// The turn exceeded the configured round-trip bound.
    #[error("max turns exceeded ({0})")]
    MaxTurnsExceeded(u32),
}

impl RuntimeError {
    /// Terminal chunk kind for this failure.
    #[must_use]
    pub fn kind(&self) -> StopKind {
        match self {
            Self::Provider(_) => StopKind::ProviderFailure,
            Self::Protocol(_) => StopKind::ProtocolError,
            Self::Store(_) => StopKind::StoreFailure,
            Self::Cancelled => StopKind::Cancelled,
            Self::MaxTurnsExceeded(_) => StopKind::MaxTurnsExceeded,
        }
    }
}

/// Wire names for terminal error chunks and `error` events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopKind {
    /// Provider failed; see message.
    ProviderFailure,
    /// Assembler rejected the stream.
    ProtocolError,
    /// Event store failed.
    StoreFailure,
    /// Cooperative cancellation.
    Cancelled,
    /// Round-trip bound hit.
    MaxTurnsExceeded,
}

impl StopKind {
    /// Wire string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProviderFailure => "provider_failure",
            Self::ProtocolError => "protocol_error",
            Self::StoreFailure => "store_failure",
            Self::Cancelled => "cancelled",
            Self::MaxTurnsExceeded => "max_turns_exceeded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_wire_strings() {
        assert_eq!(
            RuntimeError::Cancelled.kind().as_str(),
            "cancelled"
        );
        assert_eq!(
            RuntimeError::MaxTurnsExceeded(2).kind().as_str(),
            "max_turns_exceeded"
        );
        assert_eq!(
            RuntimeError::Protocol(ProtocolError::MissingIdentity { index: 0 })
                .kind()
                .as_str(),
            "protocol_error"
        );
    }

    #[test]
    fn protocol_error_message_passes_through() {
        let err = RuntimeError::Protocol(ProtocolError::DuplicateId { id: "c1".into() });
        assert_eq!(err.to_string(), "protocol_error: duplicate_id (c1)");
    }
}
