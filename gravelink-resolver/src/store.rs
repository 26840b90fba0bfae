//! Memorial store seam
//!
//! The durable store is an external collaborator offering get/set at key
//! granularity only. Nothing here relies on multi-key atomicity.

use async_trait::async_trait;
use gravelink_common::{MemorialRecord, Session, SessionKind};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Stored value for {key} is corrupt: {message}")]
    Corrupt { key: String, message: String },
}

/// Per-memorial cache plus session slots
#[async_trait]
pub trait MemorialStore: Send + Sync {
    async fn get(&self, memorial_id: &str) -> Result<Option<MemorialRecord>, StoreError>;

    async fn set(&self, memorial_id: &str, record: &MemorialRecord) -> Result<(), StoreError>;

    async fn get_session(&self, kind: SessionKind) -> Result<Option<Session>, StoreError>;

    /// `None` clears the slot
    async fn set_session(
        &self,
        kind: SessionKind,
        session: Option<Session>,
    ) -> Result<(), StoreError>;
}

/// In-memory store for tests and embedding without persistence
///
/// Records are kept in their serialized JSON form, so whatever a real
/// key-value backend would drop (e.g. `in_flight`) is dropped here too.
#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<HashMap<String, String>>,
    sessions: Mutex<HashMap<SessionKind, Session>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with an authenticated session
    pub fn with_authenticated_session(token: impl Into<String>) -> Self {
        let store = Self::default();
        if let Ok(mut sessions) = store.sessions.lock() {
            sessions.insert(SessionKind::Authenticated, Session::issue(token));
        }
        store
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned(what: &str) -> StoreError {
        StoreError::Backend(format!("{} lock poisoned", what))
    }
}

#[async_trait]
impl MemorialStore for InMemoryStore {
    async fn get(&self, memorial_id: &str) -> Result<Option<MemorialRecord>, StoreError> {
        let records = self.records.lock().map_err(|_| Self::poisoned("records"))?;
        records
            .get(memorial_id)
            .map(|json| {
                serde_json::from_str(json).map_err(|e| StoreError::Corrupt {
                    key: memorial_id.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    async fn set(&self, memorial_id: &str, record: &MemorialRecord) -> Result<(), StoreError> {
        let json =
            serde_json::to_string(record).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.records
            .lock()
            .map_err(|_| Self::poisoned("records"))?
            .insert(memorial_id.to_string(), json);
        Ok(())
    }

    async fn get_session(&self, kind: SessionKind) -> Result<Option<Session>, StoreError> {
        let sessions = self.sessions.lock().map_err(|_| Self::poisoned("sessions"))?;
        Ok(sessions.get(&kind).cloned())
    }

    async fn set_session(
        &self,
        kind: SessionKind,
        session: Option<Session>,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().map_err(|_| Self::poisoned("sessions"))?;
        match session {
            Some(session) => {
                sessions.insert(kind, session);
            }
            None => {
                sessions.remove(&kind);
            }
        }
        Ok(())
    }
}
