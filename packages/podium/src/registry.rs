//! Session Registry
//!
//! Process-wide cache of the last state, notes, and multiplex snapshot each
//! live presenter has broadcast, so late joiners can be brought up to date
//! without waiting for the next change. Entries are dropped when the owning
//! presenter disconnects.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::session::{MultiplexId, RemoteId};

/// Cached view of one presenter's session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Last `state_changed` payload, if any was sent yet.
    pub state: Option<serde_json::Value>,
    /// Last `notes_changed` payload, if any was sent yet.
    pub notes: Option<serde_json::Value>,
    pub opened_at: DateTime<Utc>,
}

impl Session {
    fn empty() -> Self {
        Self {
            state: None,
            notes: None,
            opened_at: Utc::now(),
        }
    }
}

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<RemoteId, Session>,
    multiplexes: HashMap<MultiplexId, serde_json::Value>,
}

/// Shared session cache. All operations take the lock for the duration of a
/// single map update, so concurrent connections never observe half-applied
/// changes.
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<RegistryInner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh identifier pair and register an empty session for it.
    /// Identifiers are redrawn in the (astronomically unlikely) event of a
    /// clash with a live session.
    pub async fn create(&self) -> (RemoteId, MultiplexId) {
        let mut inner = self.inner.write().await;
        loop {
            let remote_id = RemoteId::generate();
            let multiplex_id = MultiplexId::generate();
            if inner.sessions.contains_key(&remote_id)
                || inner.multiplexes.contains_key(&multiplex_id)
            {
                continue;
            }
            inner.sessions.insert(remote_id.clone(), Session::empty());
            return (remote_id, multiplex_id);
        }
    }

    /// Register the session for a resumed identifier pair. An existing cache
    /// under the same remote id is kept.
    pub async fn open(&self, remote_id: &RemoteId) {
        let mut inner = self.inner.write().await;
        inner
            .sessions
            .entry(remote_id.clone())
            .or_insert_with(Session::empty);
    }

    pub async fn get(&self, remote_id: &RemoteId) -> Option<Session> {
        self.inner.read().await.sessions.get(remote_id).cloned()
    }

    pub async fn record_state(&self, remote_id: &RemoteId, payload: serde_json::Value) {
        let mut inner = self.inner.write().await;
        inner
            .sessions
            .entry(remote_id.clone())
            .or_insert_with(Session::empty)
            .state = Some(payload);
    }

    pub async fn record_notes(&self, remote_id: &RemoteId, payload: serde_json::Value) {
        let mut inner = self.inner.write().await;
        inner
            .sessions
            .entry(remote_id.clone())
            .or_insert_with(Session::empty)
            .notes = Some(payload);
    }

    pub async fn record_multiplex(&self, multiplex_id: &MultiplexId, payload: serde_json::Value) {
        let mut inner = self.inner.write().await;
        inner.multiplexes.insert(multiplex_id.clone(), payload);
    }

    pub async fn multiplex(&self, multiplex_id: &MultiplexId) -> Option<serde_json::Value> {
        self.inner.read().await.multiplexes.get(multiplex_id).cloned()
    }

    /// Drop everything cached for a presenter. Safe to call repeatedly.
    /// Returns whether anything was removed.
    pub async fn destroy(&self, remote_id: &RemoteId, multiplex_id: &MultiplexId) -> bool {
        let mut inner = self.inner.write().await;
        let session = inner.sessions.remove(remote_id);
        let multiplex = inner.multiplexes.remove(multiplex_id);
        if let Some(ref session) = session {
            let lived = Utc::now() - session.opened_at;
            debug!(
                remote_id = %remote_id,
                "Session destroyed after {}s",
                lived.num_seconds().max(0)
            );
        }
        session.is_some() || multiplex.is_some()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}
