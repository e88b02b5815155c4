//! Session registry
//!
//! Maps session ids to sessions. Closing a tab removes its session and its
//! stored history.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

use super::{FixedIdentity, Session, SessionConfig, SessionId, UndoOutcome};
use crate::dispatch::{DispatchError, UndoAck, UndoTransport};
use crate::storage::{self, SeekStore};

#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
    store: Arc<dyn SeekStore>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids = self.ids();
        f.debug_struct("SessionRegistry")
            .field("sessions", &ids)
            .finish()
    }
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn SeekStore>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            store,
        }
    }

    /// Create (or replace) the session for a tab
    ///
    /// The registry knows the id, so the session's identity is fixed to it.
    pub fn open(&self, id: SessionId, config: SessionConfig) -> Session {
        let session = Session::new(
            config,
            self.store.clone(),
            Arc::new(FixedIdentity(Some(id))),
        );
        if let Some(previous) = self.sessions.write().insert(id, session.clone()) {
            debug!("Replacing session {}", id);
            session.take_over(&previous);
        }
        session
    }

    pub fn get(&self, id: SessionId) -> Option<Session> {
        self.sessions.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.read().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Tab closed: drop its session and delete its stored history
    pub async fn close_tab(&self, id: SessionId) {
        let removed = self.sessions.write().remove(&id);
        if let Some(session) = removed {
            session.teardown();
        }
        info!("Tab {} closed, cleaning up seek history", id);
        storage::clear_history(self.store.as_ref(), id).await;
    }

    /// Deliver an undo to one session
    pub fn undo(&self, id: SessionId) -> Option<UndoOutcome> {
        self.get(id).map(|session| session.undo())
    }
}

#[async_trait]
impl UndoTransport for SessionRegistry {
    async fn send_undo(&self, tab: SessionId) -> Result<UndoAck, DispatchError> {
        debug!("Undo message received for session {}", tab);
        match self.undo(tab) {
            Some(_) => Ok(UndoAck { success: true }),
            None => Err(DispatchError::NoReceiver(tab)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seek::SeekEvent;
    use crate::storage::{MemoryStore, history_key};

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let registry = SessionRegistry::new(Arc::new(MemoryStore::new()));
        let a = registry.open(SessionId(1), SessionConfig::default());
        let b = registry.open(SessionId(2), SessionConfig::default());

        a.record(SeekEvent::new(1.0, 2.0));
        assert_eq!(a.history_len(), 1);
        assert_eq!(b.history_len(), 0);
        assert_eq!(registry.ids(), vec![SessionId(1), SessionId(2)]);
    }

    #[tokio::test]
    async fn test_close_tab_removes_session_and_storage() {
        let store = Arc::new(MemoryStore::new());
        let registry = SessionRegistry::new(store.clone());
        let session = registry.open(SessionId(5), SessionConfig::default());

        session.record(SeekEvent::new(10.0, 20.0));
        session.flush_persistence().await;
        assert!(store.get(&history_key(SessionId(5))).await.unwrap().is_some());

        registry.close_tab(SessionId(5)).await;
        assert!(registry.get(SessionId(5)).is_none());
        assert!(store.get(&history_key(SessionId(5))).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reopened_tab_keeps_only_new_history() {
        let store = Arc::new(MemoryStore::new());
        let registry = SessionRegistry::new(store.clone());
        let key = history_key(SessionId(5));

        let first = registry.open(SessionId(5), SessionConfig::default());
        first.record(SeekEvent::new(1.0, 2.0));
        first.record(SeekEvent::new(3.0, 4.0));

        // Reopened before the first session's saves were written
        let second = registry.open(SessionId(5), SessionConfig::default());
        assert_eq!(first.history_len(), 0);
        second.record(SeekEvent::new(10.0, 20.0));
        second.flush_persistence().await;

        let stored = store.get(&key).await.unwrap().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!((stored[0].origin, stored[0].target), (10.0, 20.0));

        // Reopening again with nothing recorded drops the stored history
        let third = registry.open(SessionId(5), SessionConfig::default());
        third.flush_persistence().await;
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_send_undo_to_unknown_tab_fails() {
        let registry = SessionRegistry::new(Arc::new(MemoryStore::new()));
        let result = registry.send_undo(SessionId(9)).await;
        assert!(matches!(result, Err(DispatchError::NoReceiver(SessionId(9)))));
    }

    #[tokio::test]
    async fn test_send_undo_acknowledges_empty_history() {
        let registry = SessionRegistry::new(Arc::new(MemoryStore::new()));
        registry.open(SessionId(1), SessionConfig::default());

        let ack = registry.send_undo(SessionId(1)).await.unwrap();
        assert!(ack.success);
        assert_eq!(registry.undo(SessionId(1)), Some(UndoOutcome::Empty));
    }
}
