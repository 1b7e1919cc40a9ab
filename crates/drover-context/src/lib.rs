//! # drover-context
//!
//! Derives the model-facing message list from a session's event log and
//! packs it into a token budget.
//!
//! - [`history`] — event log → ordered [`drover_core::Message`] list.
//! - [`tokens`] — the [`tokens::TokenCounter`] seam with a chars/4
//!   heuristic default.
//! - [`packer`] — budgeted packing that keeps assistant tool-call messages
//!   and their tool results together atomically.

#![deny(unsafe_code)]

pub mod history;
pub mod packer;
pub mod tokens;

pub use history::derive_messages;
pub use packer::{ContextPacker, PackReport};
pub use tokens::{HeuristicCounter, TokenCounter};
