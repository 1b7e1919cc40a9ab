//! Provider trait — the seam between the orchestrator and any LLM backend.
//!
//! Every adapter exposes one streaming call returning a boxed stream of
//! [`ProviderChunk`]s. Retries for transient failures live inside the
//! adapter; by the time an error reaches the orchestrator the turn is over.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use drover_core::chunks::ProviderChunk;
use drover_core::messages::Message;
use drover_core::tools::ToolDefinition;

use crate::errors::{ProviderError, Result};

/// Boxed stream of [`ProviderChunk`]s returned by [`Provider::stream`].
pub type ProviderChunkStream =
    Pin<Box<dyn Stream<Item = std::result::Result<ProviderChunk, ProviderError>> + Send>>;

/// A chat-completion-style language model backend.
///
/// Implementors must be `Send + Sync`; the orchestrator holds them behind
/// an `Arc<dyn Provider>`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Adapter identifier (e.g. `"openai-compat"`).
    fn name(&self) -> &str;

    /// Model id sent with each request.
    fn model(&self) -> &str;

    /// Maximum context window in tokens.
    fn max_context_tokens(&self) -> u32;

    /// Maximum output tokens per completion.
    fn max_output_tokens(&self) -> u32;

    /// Open a streaming completion.
    ///
    /// `tools` is the registered tool table; adapters serialize it to their
    /// wire format and set `tool_choice=auto` when it is non-empty.
    async fn stream(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ProviderChunkStream>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
