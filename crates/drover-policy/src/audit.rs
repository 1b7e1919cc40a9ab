//! Append-only JSONL audit log with size-based rotation.
//!
//! One record per policy decision. Writers serialize through a mutex;
//! each record is written as a whole line and flushed, and rotation
//! happens between writes via atomic renames — a completed line is never
//! truncated or lost, and a reader never observes a partial line.
//!
//! Rotation shifts `audit.jsonl.<n>` up the chain (dropping the oldest at
//! `keep_files`) and renames the live file to `.1`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;

/// One audit line, written per policy decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// RFC 3339 UTC timestamp.
    pub ts: String,
    /// Session the call belongs to.
    pub session_id: String,
    /// Tool call id.
    pub call_id: String,
    /// Tool name.
    pub tool: String,
    /// Tool risk level name (`READ_ONLY`, ...).
    pub risk: String,
    /// Verdict (`allow`, `confirm`, `deny`).
    pub decision: String,
    /// Human-readable reason.
    pub reason: String,
    /// Redacted copy of the arguments.
    pub args_redacted: Value,
}

/// Append-only audit writer with rotation.
#[derive(Debug)]
pub struct AuditWriter {
    path: PathBuf,
    max_bytes: u64,
    keep_files: u32,
    lock: Mutex<()>,
}

impl AuditWriter {
    /// Create a writer for `path`, rotating past `max_bytes` and keeping
    /// `keep_files` rotated generations.
    pub fn new(path: &Path, max_bytes: u64, keep_files: u32) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path: path.to_owned(),
            max_bytes,
            keep_files: keep_files.max(1),
            lock: Mutex::new(()),
        })
    }

    /// Append one record as a JSON line, rotating first if the file has
    /// grown past the limit.
    pub fn write(&self, record: &AuditRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let _guard = self.lock.lock();

        self.rotate_if_needed()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        restrict_file(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }

    /// Path of the live audit file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rotate_if_needed(&self) -> Result<()> {
        let size = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(_) => return Ok(()),
        };
        if size < self.max_bytes {
            return Ok(());
        }

        debug!(path = %self.path.display(), size, "rotating audit log");
        // Shift .<n> → .<n+1>, oldest falls off the end.
        for i in (1..self.keep_files).rev() {
            let src = self.numbered(i);
            if src.exists() {
                std::fs::rename(&src, self.numbered(i + 1))?;
            }
        }
        std::fs::rename(&self.path, self.numbered(1))?;
        Ok(())
    }

    fn numbered(&self, n: u32) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{n}"));
        PathBuf::from(name)
    }
}

#[cfg(unix)]
fn restrict_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_file(_path: &Path) -> Result<()> {
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
