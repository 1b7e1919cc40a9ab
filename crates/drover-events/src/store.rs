//! Session store — the append-only event log.
//!
//! One store per base directory. Append is the only mutation on events:
//! `append` computes the next per-session `seq` and inserts the row inside
//! a single immediate transaction, so concurrent appenders can never
//! collide or leave gaps.

use std::path::Path;

use rusqlite::{params, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{EventStoreError, Result};
use crate::sqlite::connection::{self, ConnectionConfig, ConnectionPool, PooledConnection};
use crate::sqlite::migrations;
use crate::types::{EventType, NewEvent, SessionEvent};

/// Summary row for a stored session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionInfo {
    /// Session id.
    pub session_id: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// Caller-supplied metadata.
    pub metadata: Value,
}

/// Metadata row for a stored artifact.
#[derive(Clone, Debug, PartialEq)]
pub struct ArtifactInfo {
    /// Content hash.
    pub sha256: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// MIME type.
    pub media_type: String,
    /// RFC 3339 first-insert timestamp.
    pub created_at: String,
}

/// `SQLite`-backed store for sessions, their events, and artifact metadata.
#[derive(Debug)]
pub struct SessionStore {
    pool: ConnectionPool,
}

impl SessionStore {
    /// Open (or create) a store at `path`, running pending migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let pool = connection::new_file(path, &ConnectionConfig::default())?;
        let store = Self { pool };
        let applied = migrations::run_migrations(&*store.conn()?)?;
        debug!(?path, applied, "session store opened");
        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let pool = connection::new_in_memory()?;
        let store = Self { pool };
        let _ = migrations::run_migrations(&*store.conn()?)?;
        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    // ── Sessions ────────────────────────────────────────────────────

    /// Create a new session and return its id.
    pub fn create_session(&self, metadata: Value) -> Result<String> {
        let session_id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn()?;
        let _ = conn.execute(
            "INSERT INTO sessions (session_id, created_at, metadata) VALUES (?1, ?2, ?3)",
            params![session_id, now, serde_json::to_string(&metadata)?],
        )?;
        debug!(session_id, "session created");
        Ok(session_id)
    }

    /// Look up a session, or `None` if unknown.
    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionInfo>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT session_id, created_at, metadata FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        match row {
            None => Ok(None),
            Some((session_id, created_at, metadata)) => Ok(Some(SessionInfo {
                session_id,
                created_at,
                metadata: serde_json::from_str(&metadata)?,
            })),
        }
    }

    /// All sessions, newest first.
    pub fn list_sessions(&self) -> Result<Vec<SessionInfo>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, created_at, metadata FROM sessions ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (session_id, created_at, metadata) = row?;
            out.push(SessionInfo {
                session_id,
                created_at,
                metadata: serde_json::from_str(&metadata)?,
            });
        }
        Ok(out)
    }

    /// Delete a session and all its events.
    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        let conn = self.conn()?;
        // Cascade handles events; explicit for portability.
        let _ = conn.execute("DELETE FROM events WHERE session_id = ?1", params![session_id])?;
        let deleted =
            conn.execute("DELETE FROM sessions WHERE session_id = ?1", params![session_id])?;
        if deleted == 0 {
            return Err(EventStoreError::SessionNotFound(session_id.to_owned()));
        }
        Ok(())
    }

    // ── Events ──────────────────────────────────────────────────────

    /// Append an event, assigning the next `seq` inside the insert
    /// transaction. Returns the stored event.
    pub fn append(&self, session_id: &str, event: NewEvent) -> Result<SessionEvent> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let known: i64 = tx.query_row(
            "SELECT COUNT(*) FROM sessions WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        if known == 0 {
            return Err(EventStoreError::SessionNotFound(session_id.to_owned()));
        }

        let seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM events WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        let _ = tx.execute(
            "INSERT INTO events (session_id, seq, event_type, timestamp, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session_id,
                seq,
                event.event_type.as_str(),
                event.timestamp,
                serde_json::to_string(&event.payload)?,
            ],
        )?;
        tx.commit()?;

        Ok(SessionEvent {
            session_id: session_id.to_owned(),
            seq,
            event_type: event.event_type,
            timestamp: event.timestamp,
            payload: event.payload,
        })
    }

    /// Read events in append order, optionally from a sequence number
    /// (exclusive) and with a row limit.
    pub fn read_events(
        &self,
        session_id: &str,
        from_seq: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<SessionEvent>> {
        let conn = self.conn()?;
        let mut sql = String::from(
            "SELECT session_id, seq, event_type, timestamp, payload
             FROM events WHERE session_id = ?1",
        );
        if from_seq.is_some() {
            sql.push_str(" AND seq > ?2");
        }
        sql.push_str(" ORDER BY seq ASC");
        if let Some(limit) = limit {
            use std::fmt::Write;
            let _ = write!(sql, " LIMIT {limit}");
        }

        let mut stmt = conn.prepare(&sql)?;
        let map_row = |row: &rusqlite::Row<'_>| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        };
        let rows: Vec<_> = match from_seq {
            Some(from) => stmt
                .query_map(params![session_id, from], map_row)?
                .collect::<std::result::Result<_, _>>()?,
            None => stmt
                .query_map(params![session_id], map_row)?
                .collect::<std::result::Result<_, _>>()?,
        };

        let mut out = Vec::with_capacity(rows.len());
        for (session_id, seq, event_type, timestamp, payload) in rows {
            let event_type = EventType::parse(&event_type).ok_or_else(|| {
                EventStoreError::Migration {
                    message: format!("unknown event type in store: {event_type}"),
                }
            })?;
            out.push(SessionEvent {
                session_id,
                seq,
                event_type,
                timestamp,
                payload: serde_json::from_str(&payload)?,
            });
        }
        Ok(out)
    }

    // ── Artifact metadata ───────────────────────────────────────────

    /// Record artifact metadata; repeats for the same hash are no-ops.
    pub fn record_artifact(&self, sha256: &str, size_bytes: u64, media_type: &str) -> Result<()> {
        let conn = self.conn()?;
        let _ = conn.execute(
            "INSERT OR IGNORE INTO artifacts (sha256, size_bytes, media_type, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                sha256,
                size_bytes as i64,
                media_type,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Look up artifact metadata by hash.
    pub fn get_artifact(&self, sha256: &str) -> Result<Option<ArtifactInfo>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT sha256, size_bytes, media_type, created_at
                 FROM artifacts WHERE sha256 = ?1",
                params![sha256],
                |row| {
                    Ok(ArtifactInfo {
                        sha256: row.get(0)?,
                        size_bytes: row.get::<_, i64>(1)?.max(0) as u64,
                        media_type: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Current schema version of the underlying database.
    pub fn schema_version(&self) -> Result<u32> {
        migrations::current_version(&*self.conn()?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
