//! Typed session storage wrapper.

use std::sync::Arc;

use anyhow::Result;
use engram_storage::Storage;

use crate::models::Session;

/// Typed wrapper around the byte-level session store.
#[derive(Clone)]
pub struct SessionStorage {
    inner: Arc<Storage>,
}

impl SessionStorage {
    pub fn new(inner: Arc<Storage>) -> Self {
        Self { inner }
    }

    /// Persist a session (insert or overwrite).
    pub fn put(&self, session: &Session) -> Result<()> {
        let bytes = serde_json::to_vec(session)?;
        self.inner
            .sessions
            .put_raw(&session.id, &session.company_id, &bytes)
    }

    /// Load a session by ID.
    pub fn get(&self, session_id: &str) -> Result<Option<Session>> {
        match self.inner.sessions.get_raw(session_id)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// List all sessions for a company, most recently active first.
    pub fn list_by_company(&self, company_id: &str) -> Result<Vec<Session>> {
        let rows = self.inner.sessions.list_by_company_raw(company_id)?;
        let mut sessions = Vec::with_capacity(rows.len());
        for (_, bytes) in rows {
            sessions.push(serde_json::from_slice::<Session>(&bytes)?);
        }
        sessions.sort_by(|a, b| b.last_active.cmp(&a.last_active));
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessage, MessageRole};
    use engram_storage::VectorConfig;
    use tempfile::tempdir;

    fn storage() -> (SessionStorage, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let inner = Storage::new(
            dir.path().join("test.db"),
            VectorConfig {
                dimension: 4,
                ..Default::default()
            },
        )
        .unwrap();
        (SessionStorage::new(Arc::new(inner)), dir)
    }

    #[test]
    fn test_put_get_round_trip() {
        let (store, _dir) = storage();
        let mut session = Session::new("user-1", "company-1");
        session
            .messages
            .push(ChatMessage::new(MessageRole::User, "hello"));

        store.put(&session).unwrap();
        let loaded = store.get(&session.id).unwrap().unwrap();
        assert_eq!(loaded, session);
        assert!(store.get("session-missing").unwrap().is_none());
    }

    #[test]
    fn test_list_sorted_by_activity() {
        let (store, _dir) = storage();
        let mut older = Session::new("user-1", "company-1");
        older.last_active = 100;
        let mut newer = Session::new("user-1", "company-1");
        newer.last_active = 200;
        store.put(&older).unwrap();
        store.put(&newer).unwrap();

        let sessions = store.list_by_company("company-1").unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, newer.id);
    }
}
