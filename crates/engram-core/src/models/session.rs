//! Session models: the short-term conversation buffer, its running summary
//! and the working set of entities under discussion.
//!
//! A `Session` is the unit of short-term memory. Messages accumulate in a
//! bounded buffer; once the buffer overflows, the older prefix is folded into
//! `conversation_summary` and persisted as a long-term chunk. The working set
//! (`ActiveEntities`) tracks who and what the current conversation is about.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use engram_storage::time_utils;

/// Role of a buffered chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A single buffered message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: time_utils::now_ms(),
        }
    }
}

/// An entity currently under discussion in a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveEntity {
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Unix timestamp in milliseconds of the last mention
    pub last_mentioned: i64,
}

impl ActiveEntity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            last_mentioned: time_utils::now_ms(),
        }
    }
}

/// Working set of entities for the current conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActiveEntities {
    #[serde(default)]
    pub clients: Vec<ActiveEntity>,
    #[serde(default)]
    pub products: Vec<ActiveEntity>,
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
    #[serde(default)]
    pub current_intent: Option<String>,
}

impl ActiveEntities {
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
            && self.products.is_empty()
            && self.preferences.is_empty()
            && self.current_intent.is_none()
    }
}

/// A conversation session: message buffer, running summary and working set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Unique identifier for this session
    pub id: String,

    /// User this session belongs to
    pub user_id: String,

    /// Company (tenant) scope for all derived memory
    pub company_id: String,

    /// Bounded message buffer (oldest first)
    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    /// Running summary of trimmed-away messages; epochs are append-only
    #[serde(default)]
    pub conversation_summary: Option<String>,

    /// Number of messages folded into the summary so far (monotonic)
    #[serde(default)]
    pub summary_message_count: u32,

    /// Entities the conversation is currently about
    #[serde(default)]
    pub active_entities: ActiveEntities,

    /// Free-form per-session context
    #[serde(default)]
    pub context: BTreeMap<String, Value>,

    /// Total messages ever added, including trimmed ones (monotonic)
    #[serde(default)]
    pub total_messages: u32,

    /// Unix timestamp in milliseconds when this session was created
    pub created_at: i64,

    /// Unix timestamp in milliseconds of the last activity
    pub last_active: i64,

    /// True when the session never made it to durable storage and lives
    /// only in the in-process cache. Not persisted.
    #[serde(skip)]
    pub ephemeral: bool,
}

impl Session {
    /// Create a new session with a generated ID.
    pub fn new(user_id: impl Into<String>, company_id: impl Into<String>) -> Self {
        let now = time_utils::now_ms();
        Self {
            id: format!("session-{}", uuid::Uuid::new_v4()),
            user_id: user_id.into(),
            company_id: company_id.into(),
            messages: Vec::new(),
            conversation_summary: None,
            summary_message_count: 0,
            active_entities: ActiveEntities::default(),
            context: BTreeMap::new(),
            total_messages: 0,
            created_at: now,
            last_active: now,
            ephemeral: false,
        }
    }

    /// Create a session with a specific ID (for loading/testing)
    #[must_use]
    pub fn with_id(mut self, id: String) -> Self {
        self.id = id;
        self
    }

    /// Touch the activity timestamp.
    pub fn touch(&mut self) {
        self.last_active = time_utils::now_ms();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new("user-1", "company-1");
        assert!(session.id.starts_with("session-"));
        assert!(session.messages.is_empty());
        assert_eq!(session.total_messages, 0);
        assert!(session.active_entities.is_empty());
        assert!(!session.ephemeral);
    }

    #[test]
    fn test_ephemeral_flag_not_serialized() {
        let mut session = Session::new("user-1", "company-1");
        session.ephemeral = true;
        let bytes = serde_json::to_vec(&session).unwrap();
        let restored: Session = serde_json::from_slice(&bytes).unwrap();
        assert!(!restored.ephemeral);
    }
}
