//! Session lifecycle and the bounded in-process session cache.
//!
//! The cache is the authority during a turn: persistence failures are logged
//! and swallowed so a storage hiccup never takes the conversation down. A
//! session that never reaches durable storage keeps working from the cache
//! with its `ephemeral` flag set.

use dashmap::DashMap;

use crate::config::EngineConfig;
use crate::models::{ChatMessage, MessageRole, Session};
use crate::storage::SessionStorage;

/// Marker inserted between summary epochs. Epochs are append-only; an
/// existing summary is never rewritten.
pub const SUMMARY_EPOCH_DELIMITER: &str = "\n\n--- Earlier conversation ---\n\n";

pub struct SessionManager {
    storage: SessionStorage,
    cache: DashMap<String, Session>,
    config: EngineConfig,
}

impl SessionManager {
    pub fn new(storage: SessionStorage, config: EngineConfig) -> Self {
        Self {
            storage,
            cache: DashMap::new(),
            config,
        }
    }

    /// Fetch a session, loading from storage on a cache miss and creating a
    /// fresh one when nothing exists. Never fails: when storage is down the
    /// session lives in the cache alone, marked ephemeral.
    pub fn get_or_create(
        &self,
        session_id: Option<&str>,
        user_id: &str,
        company_id: &str,
    ) -> Session {
        if let Some(id) = session_id {
            if let Some(cached) = self.cache.get(id) {
                return cached.clone();
            }
            match self.storage.get(id) {
                Ok(Some(session)) => {
                    self.insert_cache(session.clone());
                    return session;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(session_id = id, error = %e, "Failed to load session");
                }
            }
        }

        let mut session = Session::new(user_id, company_id);
        if let Some(id) = session_id {
            session = session.with_id(id.to_string());
        }

        if let Err(e) = self.storage.put(&session) {
            tracing::warn!(
                session_id = %session.id,
                error = %e,
                "Failed to persist new session, continuing in-memory"
            );
            session.ephemeral = true;
        }
        self.insert_cache(session.clone());
        session
    }

    /// Persist a session and refresh the cache. The cache is refreshed even
    /// when persistence fails; in-memory state stays authoritative.
    pub fn update(&self, session: &mut Session) {
        session.touch();
        match self.storage.put(session) {
            Ok(()) => session.ephemeral = false,
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "Failed to persist session");
            }
        }
        self.insert_cache(session.clone());
    }

    /// Append a message to the buffer and persist.
    pub fn add_message(&self, session: &mut Session, role: MessageRole, content: &str) {
        session.messages.push(ChatMessage::new(role, content));
        session.total_messages = session.total_messages.saturating_add(1);
        self.update(session);
    }

    /// Whether the buffer has outgrown its bound.
    pub fn should_summarize(&self, session: &Session) -> bool {
        session.messages.len() > self.config.max_buffer_messages
    }

    /// Remove and return every message except the last `keep`. The returned
    /// prefix is in original order.
    pub fn trim_messages(&self, session: &mut Session, keep: usize) -> Vec<ChatMessage> {
        if session.messages.len() <= keep {
            return Vec::new();
        }
        let cut = session.messages.len() - keep;
        session.messages.drain(..cut).collect()
    }

    /// Fold `count` more messages into the running summary. New text is
    /// appended behind the epoch delimiter; earlier epochs are untouched.
    pub fn update_summary(&self, session: &mut Session, text: &str, count: u32) {
        session.conversation_summary = Some(match session.conversation_summary.take() {
            Some(existing) => format!("{existing}{SUMMARY_EPOCH_DELIMITER}{text}"),
            None => text.to_string(),
        });
        session.summary_message_count = session.summary_message_count.saturating_add(count);
    }

    fn insert_cache(&self, session: Session) {
        if !self.cache.contains_key(&session.id) && self.cache.len() >= self.config.cache_capacity {
            self.evict_stalest();
        }
        self.cache.insert(session.id.clone(), session);
    }

    fn evict_stalest(&self) {
        let stalest = self
            .cache
            .iter()
            .min_by_key(|entry| entry.last_active)
            .map(|entry| entry.key().clone());
        if let Some(key) = stalest {
            self.cache.remove(&key);
        }
    }

    #[cfg(test)]
    fn cached(&self, session_id: &str) -> Option<Session> {
        self.cache.get(session_id).map(|s| s.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_storage::{Storage, VectorConfig};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn manager(config: EngineConfig) -> (SessionManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let storage = Storage::new(
            dir.path().join("test.db"),
            VectorConfig {
                dimension: 4,
                ..Default::default()
            },
        )
        .unwrap();
        let sessions = SessionStorage::new(Arc::new(storage));
        (SessionManager::new(sessions, config), dir)
    }

    #[test]
    fn test_get_or_create_round_trip() {
        let (manager, _dir) = manager(EngineConfig::default());
        let created = manager.get_or_create(None, "user-1", "company-1");
        assert!(!created.ephemeral);

        let reloaded = manager.get_or_create(Some(&created.id), "user-1", "company-1");
        assert_eq!(reloaded.id, created.id);
    }

    #[test]
    fn test_update_clears_ephemeral_once_persisted() {
        let (manager, _dir) = manager(EngineConfig::default());
        let mut session = manager.get_or_create(None, "user-1", "company-1");
        session.ephemeral = true;

        manager.update(&mut session);
        assert!(!session.ephemeral);
        assert!(!manager.cached(&session.id).unwrap().ephemeral);
    }

    #[test]
    fn test_unknown_id_creates_with_that_id() {
        let (manager, _dir) = manager(EngineConfig::default());
        let session = manager.get_or_create(Some("session-ext-1"), "user-1", "company-1");
        assert_eq!(session.id, "session-ext-1");
    }

    #[test]
    fn test_should_summarize_boundary() {
        let config = EngineConfig {
            max_buffer_messages: 3,
            ..Default::default()
        };
        let (manager, _dir) = manager(config);
        let mut session = Session::new("user-1", "company-1");
        for _ in 0..3 {
            session
                .messages
                .push(ChatMessage::new(MessageRole::User, "hi"));
        }
        assert!(!manager.should_summarize(&session));
        session
            .messages
            .push(ChatMessage::new(MessageRole::Assistant, "hello"));
        assert!(manager.should_summarize(&session));
    }

    #[test]
    fn test_trim_returns_prefix_in_order() {
        let (manager, _dir) = manager(EngineConfig::default());
        let mut session = Session::new("user-1", "company-1");
        for i in 0..5 {
            session
                .messages
                .push(ChatMessage::new(MessageRole::User, format!("m{i}")));
        }

        let trimmed = manager.trim_messages(&mut session, 2);
        assert_eq!(trimmed.len(), 3);
        assert_eq!(trimmed[0].content, "m0");
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].content, "m3");

        // Short buffers are untouched
        assert!(manager.trim_messages(&mut session, 5).is_empty());
    }

    #[test]
    fn test_update_summary_appends_epochs() {
        let (manager, _dir) = manager(EngineConfig::default());
        let mut session = Session::new("user-1", "company-1");

        manager.update_summary(&mut session, "first epoch", 10);
        assert_eq!(session.conversation_summary.as_deref(), Some("first epoch"));
        assert_eq!(session.summary_message_count, 10);

        manager.update_summary(&mut session, "second epoch", 5);
        let summary = session.conversation_summary.as_deref().unwrap();
        assert!(summary.starts_with("first epoch"));
        assert!(summary.contains(SUMMARY_EPOCH_DELIMITER));
        assert!(summary.ends_with("second epoch"));
        assert_eq!(session.summary_message_count, 15);
    }

    #[test]
    fn test_cache_evicts_stalest() {
        let config = EngineConfig {
            cache_capacity: 2,
            ..Default::default()
        };
        let (manager, _dir) = manager(config);

        let mut stale = manager.get_or_create(None, "user-1", "company-1");
        stale.last_active = 1;
        manager.cache.insert(stale.id.clone(), stale.clone());

        let fresh = manager.get_or_create(None, "user-1", "company-1");
        let newcomer = manager.get_or_create(None, "user-1", "company-1");

        assert!(manager.cached(&stale.id).is_none());
        assert!(manager.cached(&fresh.id).is_some());
        assert!(manager.cached(&newcomer.id).is_some());
    }
}
