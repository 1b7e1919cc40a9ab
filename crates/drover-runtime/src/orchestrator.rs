//! The orchestrator turn loop.
//!
//! One call to [`Orchestrator::turn`] drives a conversational turn to
//! quiescence: pack context, stream the model, assemble tool calls, gate
//! each through policy, execute sequentially, append results, and loop
//! until the model answers with text only or a bound is hit. The caller
//! receives a finite stream of [`StreamChunk`]s ending in `turn_complete`
//! or a fatal `error`.
//!
//! Text deltas stream through immediately; tool lifecycle chunks are
//! emitted only after their events are durable in the session log. On any
//! early termination, synthetic `tool_result(error=aborted)` events are
//! appended for calls still lacking a result — the log never holds an
//! `assistant_tool_call` without a paired `tool_result`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use drover_context::{derive_messages, ContextPacker};
use drover_core::chunks::{ProviderChunk, StreamChunk};
use drover_core::messages::ToolCall;
use drover_core::tools::{ToolResult, Verdict};
use drover_events::NewEvent;
use drover_llm::{Provider, ProviderChunkStream, ProviderError, ToolCallAssembler};
use drover_policy::PolicyEngine;
use drover_settings::SessionSettings;
use drover_tools::{validate_arguments, ToolContext, ToolRegistry};

use crate::confirm::ConfirmationHandler;
use crate::errors::StopKind;
use crate::session::Session;

/// Default system prompt for diagnostics sessions.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are drover, an operations assistant. \
You investigate targets with the registered diagnostic tools. Always name the \
target explicitly, prefer read-only diagnostics first, and report findings \
plainly. If a tool is denied, explain what you could not do and continue.";

/// Turn loop configuration.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// System prompt prepended to every packed context.
    pub system_prompt: String,
    /// Upper bound for the packed context, in tokens.
    pub token_budget: u32,
    /// Tokens reserved for the model's response.
    pub reserve_tokens: u32,
    /// Tool round-trips allowed per user turn.
    pub max_turns: u32,
    /// Per-tool execution timeout.
    pub tool_timeout: Duration,
    /// How long to wait for operator confirmation.
    pub confirm_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            token_budget: 100_000,
            reserve_tokens: 4_096,
            max_turns: 20,
            tool_timeout: Duration::from_secs(30),
            confirm_timeout: Duration::from_secs(60),
        }
    }
}

impl OrchestratorConfig {
    /// Build a config from `session.*` settings.
    #[must_use]
    pub fn from_settings(settings: &SessionSettings, system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            token_budget: settings.token_budget,
            reserve_tokens: settings.reserve_tokens,
            max_turns: settings.max_turns,
            tool_timeout: Duration::from_secs(settings.tool_timeout_seconds),
            confirm_timeout: Duration::from_secs(settings.confirm_timeout_seconds),
        }
    }
}

/// A running turn: the chunk stream plus its cancellation token.
pub struct TurnHandle {
    /// Ordered, finite chunk stream.
    pub chunks: ReceiverStream<StreamChunk>,
    /// Cancels the turn at its next suspension point.
    pub cancel: CancellationToken,
}

/// The turn state machine. Construct once per session and reuse.
pub struct Orchestrator {
    session: Session,
    registry: Arc<ToolRegistry>,
    provider: Arc<dyn Provider>,
    policy: Arc<PolicyEngine>,
    confirmer: Option<Arc<dyn ConfirmationHandler>>,
    packer: Arc<ContextPacker>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Wire up an orchestrator over explicit components.
    #[must_use]
    pub fn new(
        session: Session,
        registry: Arc<ToolRegistry>,
        provider: Arc<dyn Provider>,
        policy: Arc<PolicyEngine>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            session,
            registry,
            provider,
            policy,
            confirmer: None,
            packer: Arc::new(ContextPacker::default()),
            config,
        }
    }

    /// Install an operator confirmation handler. Without one, every
    /// `confirm` verdict is treated as a refusal.
    #[must_use]
    pub fn with_confirmer(mut self, confirmer: Arc<dyn ConfirmationHandler>) -> Self {
        self.confirmer = Some(confirmer);
        self
    }

    /// Replace the default token counter.
    #[must_use]
    pub fn with_packer(mut self, packer: Arc<ContextPacker>) -> Self {
        self.packer = packer;
        self
    }

    /// The session this orchestrator drives.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run one turn for `user_text`.
    ///
    /// Returns immediately; the turn executes in a background task and
    /// streams chunks through the handle. The stream is finite and ends
    /// with `turn_complete` or `error`.
    #[must_use]
    pub fn turn(&self, user_text: &str) -> TurnHandle {
        let (tx, rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let driver = TurnDriver {
            session: self.session.clone(),
            registry: self.registry.clone(),
            provider: self.provider.clone(),
            policy: self.policy.clone(),
            confirmer: self.confirmer.clone(),
            packer: self.packer.clone(),
            config: self.config.clone(),
            cancel: cancel.clone(),
            tx,
        };
        let text = user_text.to_owned();
        drop(tokio::spawn(async move { driver.run(text).await }));
        TurnHandle {
            chunks: ReceiverStream::new(rx),
            cancel,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Turn driver
// ─────────────────────────────────────────────────────────────────────────────

enum Consumed {
    Done {
        text: String,
        assembler: ToolCallAssembler,
    },
    Provider(ProviderError),
    Cancelled,
}

enum Lifecycle {
    Done,
    CancelledMidExecution,
    Fatal(String),
}

struct TurnDriver {
    session: Session,
    registry: Arc<ToolRegistry>,
    provider: Arc<dyn Provider>,
    policy: Arc<PolicyEngine>,
    confirmer: Option<Arc<dyn ConfirmationHandler>>,
    packer: Arc<ContextPacker>,
    config: OrchestratorConfig,
    cancel: CancellationToken,
    tx: mpsc::Sender<StreamChunk>,
}

impl TurnDriver {
    async fn run(self, user_text: String) {
        if let Err(e) = self.session.append(NewEvent::user_prompt(&user_text)) {
            self.emit_fatal(StopKind::StoreFailure, &e.to_string()).await;
            return;
        }
        let mut seen = match self.session.seen_call_ids() {
            Ok(seen) => seen,
            Err(e) => {
                self.emit_fatal(StopKind::StoreFailure, &e.to_string()).await;
                return;
            }
        };

        let mut round_trips = 0u32;

        loop {
            // Materialize the prompt from the log under the token budget.
            let events = match self.session.events() {
                Ok(events) => events,
                Err(e) => {
                    self.emit_fatal(StopKind::StoreFailure, &e.to_string()).await;
                    return;
                }
            };
            let messages = derive_messages(&events);
            let tool_defs = self.registry.definitions();
            let tools_schema = (!tool_defs.is_empty()).then(|| self.registry.openai_schema());
            let (packed, report) = self.packer.pack(
                &messages,
                tools_schema.as_ref(),
                &self.config.system_prompt,
                self.config.token_budget,
                self.config.reserve_tokens,
            );
            debug!(
                session_id = self.session.id(),
                round = round_trips,
                packed = packed.len(),
                dropped = report.dropped_messages,
                "calling provider"
            );

            let stream = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    self.finish_cancelled(&[]).await;
                    return;
                }
                result = self.provider.stream(&packed, &tool_defs) => match result {
                    Ok(stream) => stream,
                    Err(e) => {
                        self.emit_fatal(StopKind::ProviderFailure, &e.to_string()).await;
                        return;
                    }
                }
            };

            let (text, assembler) = match self.consume_stream(stream).await {
                Consumed::Done { text, assembler } => (text, assembler),
                Consumed::Provider(e) => {
                    self.emit_fatal(StopKind::ProviderFailure, &e.to_string()).await;
                    return;
                }
                Consumed::Cancelled => {
                    self.finish_cancelled(&[]).await;
                    return;
                }
            };

            let calls = match assembler.finish() {
                Ok(calls) => calls,
                Err(protocol_error) => {
                    self.emit_fatal(StopKind::ProtocolError, &protocol_error.to_string())
                        .await;
                    return;
                }
            };

            if !text.is_empty() {
                if let Err(e) = self
                    .session
                    .append(NewEvent::assistant_text(&text, Some(self.provider.model())))
                {
                    self.emit_fatal(StopKind::StoreFailure, &e.to_string()).await;
                    return;
                }
            }

            if calls.is_empty() {
                info!(session_id = self.session.id(), round_trips, "turn complete");
                self.emit(StreamChunk::TurnComplete).await;
                return;
            }

            // Record the calls before any execution; emit completions.
            let mut appended: Vec<ToolCall> = Vec::with_capacity(calls.len());
            for call in &calls {
                match self.session.append(NewEvent::assistant_tool_call(call)) {
                    Ok(_) => {
                        appended.push(call.clone());
                        self.emit(StreamChunk::ToolCallCompleted { call: call.clone() })
                            .await;
                    }
                    Err(e) => {
                        self.abort_outstanding(&appended).await;
                        self.emit_fatal(StopKind::StoreFailure, &e.to_string()).await;
                        return;
                    }
                }
            }

            // Dispatch sequentially, in assembler order. A later call may
            // observe events appended by an earlier one.
            let mut outstanding: Vec<ToolCall> = calls.clone();
            for call in &calls {
                if self.cancel.is_cancelled() {
                    self.finish_cancelled(&outstanding).await;
                    return;
                }
                match self.run_lifecycle(call, &mut seen).await {
                    Lifecycle::Done => {
                        let _ = outstanding.remove(0);
                    }
                    Lifecycle::CancelledMidExecution => {
                        let result = ToolResult::error("cancelled", "tool execution cancelled");
                        if let Err(e) = self
                            .session
                            .append(NewEvent::tool_result(&call.id, &call.name, &result))
                        {
                            warn!(call_id = %call.id, error = %e, "failed to append cancelled result");
                        }
                        self.emit(StreamChunk::ToolResult {
                            call_id: call.id.clone(),
                            name: call.name.clone(),
                            result,
                        })
                        .await;
                        let _ = outstanding.remove(0);
                        self.finish_cancelled(&outstanding).await;
                        return;
                    }
                    Lifecycle::Fatal(message) => {
                        self.abort_outstanding(&outstanding).await;
                        self.emit_fatal(StopKind::StoreFailure, &message).await;
                        return;
                    }
                }
            }

            round_trips += 1;
            if round_trips >= self.config.max_turns {
                self.emit_fatal(
                    StopKind::MaxTurnsExceeded,
                    &format!("reached {} tool round-trips", self.config.max_turns),
                )
                .await;
                return;
            }
        }
    }

    /// Forward provider chunks downstream while feeding the assembler.
    async fn consume_stream(&self, mut stream: ProviderChunkStream) -> Consumed {
        let mut text = String::with_capacity(1024);
        let mut assembler = ToolCallAssembler::new();
        let mut announced: HashSet<u32> = HashSet::new();

        loop {
            let item = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Consumed::Cancelled,
                item = stream.next() => item,
            };
            match item {
                None => break,
                Some(Err(e)) => return Consumed::Provider(e),
                Some(Ok(ProviderChunk::ContentDelta { text: delta })) => {
                    text.push_str(&delta);
                    self.emit(StreamChunk::TextDelta { text: delta }).await;
                }
                Some(Ok(chunk @ ProviderChunk::ToolCallDelta { .. })) => {
                    let ProviderChunk::ToolCallDelta {
                        index, args_chunk, ..
                    } = &chunk
                    else {
                        continue;
                    };
                    let index = *index;
                    let delta = args_chunk.clone();
                    assembler.feed_chunk(&chunk);

                    if !announced.contains(&index) {
                        if let Some((id, name)) = assembler.slot_identity(index) {
                            let started = StreamChunk::ToolCallStarted {
                                call_id: id.to_owned(),
                                name: name.to_owned(),
                            };
                            let _ = announced.insert(index);
                            self.emit(started).await;
                        }
                    }
                    if let Some(delta) = delta {
                        let call_id = assembler
                            .slot_identity(index)
                            .map_or_else(|| format!("slot_{index}"), |(id, _)| id.to_owned());
                        self.emit(StreamChunk::ToolCallArgumentsDelta { call_id, delta })
                            .await;
                    }
                }
                Some(Ok(ProviderChunk::Done { reason })) => {
                    debug!(%reason, "provider stream finished");
                    break;
                }
            }
        }
        Consumed::Done { text, assembler }
    }

    /// Run one call through the full lifecycle: duplicate check, lookup,
    /// validation, policy, confirmation, execution, artifacts, result.
    async fn run_lifecycle(&self, call: &ToolCall, seen: &mut HashSet<String>) -> Lifecycle {
        if !seen.insert(call.id.clone()) {
            let result = ToolResult::error(
                "duplicate_call_id",
                format!("call id {:?} already used in this session", call.id),
            );
            return self.finish_call(call, result).await;
        }

        let Some(tool) = self.registry.get(&call.name) else {
            let result =
                ToolResult::error("unknown_tool", format!("unknown tool: {}", call.name));
            return self.finish_call(call, result).await;
        };
        let definition = tool.definition();

        if let Err(message) = validate_arguments(&definition.parameters, &call.arguments) {
            let result = ToolResult::error("invalid_arguments", message);
            return self.finish_call(call, result).await;
        }

        let decision = self.policy.evaluate(&definition, &call.arguments);
        if let Err(e) = self
            .policy
            .record(self.session.id(), &call.id, &definition, &decision)
        {
            warn!(call_id = %call.id, error = %e, "audit write failed");
        }
        if let Err(e) = self.session.append(NewEvent::policy_decision(
            &call.id,
            &call.name,
            decision.verdict,
            &decision.reason,
            decision.args_redacted.clone(),
        )) {
            return Lifecycle::Fatal(e.to_string());
        }
        self.emit(StreamChunk::PolicyDecision {
            call_id: call.id.clone(),
            tool: call.name.clone(),
            verdict: decision.verdict,
            reason: decision.reason.clone(),
        })
        .await;

        match decision.verdict {
            Verdict::Deny => {
                let result = ToolResult::denied(decision.reason);
                return self.finish_call(call, result).await;
            }
            Verdict::Confirm => {
                let approved = match &self.confirmer {
                    None => false,
                    Some(handler) => {
                        let ask = handler.confirm(&call.name, call);
                        tokio::select! {
                            biased;
                            () = self.cancel.cancelled() => return Lifecycle::CancelledMidExecution,
                            answer = tokio::time::timeout(self.config.confirm_timeout, ask) => {
                                answer.unwrap_or(false)
                            }
                        }
                    }
                };
                if !approved {
                    debug!(call_id = %call.id, tool = %call.name, "confirmation declined");
                    let result = ToolResult::denied("confirmation_declined");
                    return self.finish_call(call, result).await;
                }
            }
            Verdict::Allow => {}
        }

        let ctx = ToolContext {
            session_id: self.session.id().to_owned(),
            tool_call_id: call.id.clone(),
            cancellation: self.cancel.child_token(),
        };
        let timeout = self.config.tool_timeout;
        let mut result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Lifecycle::CancelledMidExecution,
            outcome = tokio::time::timeout(timeout, tool.execute(call.arguments.clone(), &ctx)) => {
                match outcome {
                    Err(_elapsed) => ToolResult::error(
                        "timeout",
                        format!("tool timed out after {}s", timeout.as_secs()),
                    ),
                    Ok(Err(tool_error)) => ToolResult::error("tool_error", tool_error.to_string()),
                    Ok(Ok(result)) => result,
                }
            }
        };

        // Persist artifact payloads and replace them with refs.
        for payload in std::mem::take(&mut result.pending_artifacts) {
            match self.session.artifacts().put(&payload.content) {
                Ok(sha) => {
                    if let Err(e) = self.session.store().record_artifact(
                        &sha,
                        payload.content.len() as u64,
                        &payload.media_type,
                    ) {
                        warn!(sha = %sha, error = %e, "artifact metadata write failed");
                    }
                    result.artifact_refs.push(sha);
                }
                Err(e) => warn!(call_id = %call.id, error = %e, "artifact write failed"),
            }
        }

        self.finish_call(call, result).await
    }

    /// Append the result event, then emit the chunk.
    async fn finish_call(&self, call: &ToolCall, result: ToolResult) -> Lifecycle {
        if let Err(e) = self
            .session
            .append(NewEvent::tool_result(&call.id, &call.name, &result))
        {
            return Lifecycle::Fatal(e.to_string());
        }
        self.emit(StreamChunk::ToolResult {
            call_id: call.id.clone(),
            name: call.name.clone(),
            result,
        })
        .await;
        Lifecycle::Done
    }

    /// Synthetic `aborted` results for calls that will never run.
    async fn abort_outstanding(&self, outstanding: &[ToolCall]) {
        for call in outstanding {
            let result = ToolResult::error("aborted", "turn terminated before this call ran");
            if let Err(e) = self
                .session
                .append(NewEvent::tool_result(&call.id, &call.name, &result))
            {
                warn!(call_id = %call.id, error = %e, "failed to append aborted result");
            }
            self.emit(StreamChunk::ToolResult {
                call_id: call.id.clone(),
                name: call.name.clone(),
                result,
            })
            .await;
        }
    }

    async fn finish_cancelled(&self, outstanding: &[ToolCall]) {
        self.abort_outstanding(outstanding).await;
        self.emit_fatal(StopKind::Cancelled, "turn cancelled by caller").await;
    }

    /// Append an `error` event and emit the terminal error chunk.
    async fn emit_fatal(&self, kind: StopKind, message: &str) {
        if let Err(e) = self.session.append(NewEvent::error(kind.as_str(), message)) {
            warn!(error = %e, "failed to append error event");
        }
        self.emit(StreamChunk::Error {
            kind: kind.as_str().to_owned(),
            message: message.to_owned(),
        })
        .await;
    }

    async fn emit(&self, chunk: StreamChunk) {
        // A dropped receiver is not an error; the log remains authoritative.
        let _ = self.tx.send(chunk).await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_settings_maps_fields() {
        let settings = SessionSettings {
            token_budget: 5_000,
            reserve_tokens: 500,
            max_turns: 3,
            tool_timeout_seconds: 7,
            confirm_timeout_seconds: 11,
            ..Default::default()
        };
        let config = OrchestratorConfig::from_settings(&settings, "prompt");
        assert_eq!(config.token_budget, 5_000);
        assert_eq!(config.reserve_tokens, 500);
        assert_eq!(config.max_turns, 3);
        assert_eq!(config.tool_timeout, Duration::from_secs(7));
        assert_eq!(config.confirm_timeout, Duration::from_secs(11));
        assert_eq!(config.system_prompt, "prompt");
    }

    #[test]
    fn default_config_is_bounded() {
        let config = OrchestratorConfig::default();
        assert!(config.max_turns > 0);
        assert!(config.token_budget > config.reserve_tokens);
    }
}
