//! # drover-events
//!
//! Durable session state for the drover runtime:
//!
//! - **[`store`]** — append-only event log in `SQLite` (WAL, pooled
//!   connections, versioned migrations). `seq` is assigned inside the
//!   insert transaction, so it is strictly increasing with no gaps.
//! - **[`artifacts`]** — content-addressed blob store keyed by SHA-256,
//!   owner-only file permissions, path traversal refused at the hash level.
//! - **[`export`]** — session export as canonical JSONL or an operator
//!   runbook in Markdown.

#![deny(unsafe_code)]

pub mod artifacts;
pub mod errors;
pub mod export;
pub mod sqlite;
pub mod store;
pub mod types;

pub use artifacts::ArtifactStore;
pub use errors::{EventStoreError, Result};
pub use export::ExportFormat;
pub use store::{SessionInfo, SessionStore};
pub use types::{EventType, NewEvent, SessionEvent};
