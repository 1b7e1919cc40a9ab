//! # drover-core
//!
//! Shared vocabulary for the drover agent runtime.
//!
//! Everything that crosses a crate boundary lives here: conversation
//! [`messages`], tool descriptors and results ([`tools`]), the streaming
//! chunk sums ([`chunks`]), the tracing bootstrap ([`logging`]), and small
//! [`text`] helpers.

#![deny(unsafe_code)]

pub mod chunks;
pub mod logging;
pub mod messages;
pub mod text;
pub mod tools;

pub use chunks::{ProviderChunk, StreamChunk};
pub use messages::{Message, Role, ToolCall};
pub use tools::{
    ArtifactPayload, PrivacyScope, RiskLevel, ToolDefinition, ToolParameterSchema, ToolResult,
    ToolStatus, Verdict,
};
