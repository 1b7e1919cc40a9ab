//! # drover-runtime
//!
//! The orchestrator: a bounded state machine that drives one conversational
//! turn to quiescence, alternating between the model and tool dispatch.
//!
//! - [`session`] — session lifecycle over the event store.
//! - [`confirm`] — the operator confirmation seam.
//! - [`orchestrator`] — the turn loop: context packing, streaming,
//!   assembly, policy gating, sequential tool execution, and a finite
//!   [`drover_core::StreamChunk`] output stream.
//!
//! Text deltas are forwarded downstream as they arrive; every other chunk
//! is emitted only after its event is durable in the session log, so the
//! chunk stream never observes state the log does not yet hold.

#![deny(unsafe_code)]

pub mod confirm;
pub mod errors;
pub mod orchestrator;
pub mod session;

pub use confirm::ConfirmationHandler;
pub use errors::{RuntimeError, StopKind};
pub use orchestrator::{Orchestrator, OrchestratorConfig, TurnHandle};
pub use session::Session;
