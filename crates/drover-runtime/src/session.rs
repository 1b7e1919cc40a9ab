//! Session lifecycle over the event store.
//!
//! A [`Session`] binds a session id to the shared store and artifact
//! store. It is cheap to clone; all handles append to the same log.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use drover_events::{
    ArtifactStore, EventStoreError, EventType, NewEvent, SessionEvent, SessionStore,
};

/// One conversation session.
#[derive(Clone, Debug)]
pub struct Session {
    store: Arc<SessionStore>,
    artifacts: Arc<ArtifactStore>,
    session_id: String,
}

impl Session {
    /// Create a new session.
    pub fn start(
        store: Arc<SessionStore>,
        artifacts: Arc<ArtifactStore>,
        metadata: Value,
    ) -> Result<Self, EventStoreError> {
        let session_id = store.create_session(metadata)?;
        info!(session_id, "session started");
        Ok(Self {
            store,
            artifacts,
            session_id,
        })
    }

    /// Attach to an existing session.
    pub fn resume(
        store: Arc<SessionStore>,
        artifacts: Arc<ArtifactStore>,
        session_id: &str,
    ) -> Result<Self, EventStoreError> {
        if store.get_session(session_id)?.is_none() {
            return Err(EventStoreError::SessionNotFound(session_id.to_owned()));
        }
        info!(session_id, "session resumed");
        Ok(Self {
            store,
            artifacts,
            session_id: session_id.to_owned(),
        })
    }

    /// Stable session id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.session_id
    }

    /// Append an event to this session.
    pub fn append(&self, event: NewEvent) -> Result<SessionEvent, EventStoreError> {
        self.store.append(&self.session_id, event)
    }

    /// All events in append order.
    pub fn events(&self) -> Result<Vec<SessionEvent>, EventStoreError> {
        self.store.read_events(&self.session_id, None, None)
    }

    /// Call ids already used in this session, for duplicate rejection.
    pub fn seen_call_ids(&self) -> Result<HashSet<String>, EventStoreError> {
        let mut seen = HashSet::new();
        for event in self.events()? {
            if event.event_type == EventType::AssistantToolCall {
                if let Some(id) = event.payload.get("call_id").and_then(Value::as_str) {
                    let _ = seen.insert(id.to_owned());
                }
            }
        }
        Ok(seen)
    }

    /// Record a provider switch as a `session_meta` event. The session id
    /// stays stable across the switch.
    pub fn record_provider_switch(&self, from: &str, to: &str) -> Result<(), EventStoreError> {
        let _ = self.append(NewEvent::provider_switch(from, to))?;
        Ok(())
    }

    /// Shared event store.
    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Shared artifact store.
    #[must_use]
    pub fn artifacts(&self) -> &Arc<ArtifactStore> {
        &self.artifacts
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::messages::ToolCall;
    use serde_json::json;

    fn session() -> (tempfile::TempDir, Session) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::open_in_memory().unwrap());
        let artifacts = Arc::new(ArtifactStore::open(&dir.path().join("artifacts")).unwrap());
        let session = Session::start(store, artifacts, json!({})).unwrap();
        (dir, session)
    }

    #[test]
    fn start_creates_a_session() {
        let (_dir, session) = session();
        assert!(!session.id().is_empty());
        assert!(session.events().unwrap().is_empty());
    }

    #[test]
    fn resume_unknown_session_fails() {
        let (_dir, session) = session();
        let err = Session::resume(
            session.store().clone(),
            session.artifacts().clone(),
            "missing",
        )
        .unwrap_err();
        assert!(matches!(err, EventStoreError::SessionNotFound(_)));
    }

    #[test]
    fn resume_existing_session_sees_events() {
        let (_dir, session) = session();
        let _ = session.append(NewEvent::user_prompt("hello")).unwrap();
        let resumed = Session::resume(
            session.store().clone(),
            session.artifacts().clone(),
            session.id(),
        )
        .unwrap();
        assert_eq!(resumed.events().unwrap().len(), 1);
    }

    #[test]
    fn seen_call_ids_collects_tool_calls() {
        let (_dir, session) = session();
        let call = ToolCall {
            id: "c1".into(),
            name: "resolve_target".into(),
            arguments: serde_json::Map::new(),
        };
        let _ = session.append(NewEvent::assistant_tool_call(&call)).unwrap();
        let seen = session.seen_call_ids().unwrap();
        assert!(seen.contains("c1"));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn provider_switch_appends_session_meta() {
        let (_dir, session) = session();
        session.record_provider_switch("openai-compat", "ollama").unwrap();
        let events = session.events().unwrap();
        assert_eq!(events[0].event_type, EventType::SessionMeta);
        assert_eq!(events[0].payload["from"], "openai-compat");
    }
}
