//! Long-term memory chunk model.
//!
//! Chunks are the unit of retrieval: conversation summaries, notable
//! exchanges and successful action records, all embedded for semantic
//! search. Chunk content is immutable after insert; only the access
//! bookkeeping fields change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use engram_storage::time_utils;

/// Kind of long-term memory a chunk holds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    /// Condensed summary of a trimmed buffer prefix
    Summary,
    /// A notable plain conversation exchange
    Conversation,
    /// Record of a successfully executed action
    ActionSuccess,
}

impl ChunkType {
    /// Wire/index form of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Summary => "summary",
            ChunkType::Conversation => "conversation",
            ChunkType::ActionSuccess => "action_success",
        }
    }
}

/// Typed chunk metadata with a free-form escape hatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    /// Number of messages folded into a summary chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_count: Option<u32>,

    /// Start of the covered time range (ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_timestamp: Option<i64>,

    /// End of the covered time range (ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_timestamp: Option<i64>,

    /// Action type for action-success chunks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,

    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A chunk of long-term memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryChunk {
    /// Unique identifier for this chunk
    pub id: String,

    /// Session that produced this memory
    pub session_id: String,

    /// Company (tenant) scope
    pub company_id: String,

    /// User the memory belongs to
    pub user_id: String,

    pub chunk_type: ChunkType,

    /// The memory content (immutable after insert)
    pub content: String,

    /// Vector embedding for semantic search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Model used to generate the embedding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,

    /// Embedding dimension (for validation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_dim: Option<usize>,

    #[serde(default)]
    pub metadata: ChunkMetadata,

    /// Retrieval weight in [0, 1]
    pub importance: f32,

    /// How many times retrieval surfaced this chunk
    #[serde(default)]
    pub access_count: u32,

    /// Unix timestamp in milliseconds when this chunk was created
    pub created_at: i64,

    /// Unix timestamp in milliseconds of the last retrieval hit
    pub last_accessed: i64,
}

impl MemoryChunk {
    /// Create a new chunk with a generated ID.
    pub fn new(
        company_id: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        chunk_type: ChunkType,
        content: impl Into<String>,
    ) -> Self {
        let now = time_utils::now_ms();
        Self {
            id: format!("chunk-{}", uuid::Uuid::new_v4()),
            session_id: session_id.into(),
            company_id: company_id.into(),
            user_id: user_id.into(),
            chunk_type,
            content: content.into(),
            embedding: None,
            embedding_model: None,
            embedding_dim: None,
            metadata: ChunkMetadata::default(),
            importance: 0.5,
            access_count: 0,
            created_at: now,
            last_accessed: now,
        }
    }

    /// Create a chunk with a specific ID (for deserialization/testing)
    #[must_use]
    pub fn with_id(mut self, id: String) -> Self {
        self.id = id;
        self
    }

    /// Attach an embedding to this chunk
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>, model: String) -> Self {
        self.embedding_dim = Some(embedding.len());
        self.embedding = Some(embedding);
        self.embedding_model = Some(model);
        self
    }

    #[must_use]
    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: ChunkMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Check if this chunk has an embedding
    #[must_use]
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }

    /// Record a retrieval hit.
    pub fn mark_accessed(&mut self) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed = time_utils::now_ms();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_type_wire_form() {
        assert_eq!(ChunkType::Summary.as_str(), "summary");
        assert_eq!(ChunkType::ActionSuccess.as_str(), "action_success");
        let json = serde_json::to_string(&ChunkType::ActionSuccess).unwrap();
        assert_eq!(json, "\"action_success\"");
    }

    #[test]
    fn test_builder_and_access() {
        let mut chunk = MemoryChunk::new(
            "company-1",
            "user-1",
            "session-1",
            ChunkType::Conversation,
            "discussed pricing",
        )
        .with_embedding(vec![0.1, 0.2], "test-model".to_string())
        .with_importance(1.5);

        assert!(chunk.has_embedding());
        assert_eq!(chunk.embedding_dim, Some(2));
        assert_eq!(chunk.importance, 1.0);

        let before = chunk.access_count;
        chunk.mark_accessed();
        assert_eq!(chunk.access_count, before + 1);
    }

    #[test]
    fn test_metadata_extra_round_trip() {
        let mut metadata = ChunkMetadata {
            message_count: Some(12),
            ..Default::default()
        };
        metadata
            .extra
            .insert("channel".to_string(), serde_json::json!("whatsapp"));

        let chunk = MemoryChunk::new("c", "u", "s", ChunkType::Summary, "text")
            .with_metadata(metadata.clone());
        let bytes = serde_json::to_vec(&chunk).unwrap();
        let restored: MemoryChunk = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(restored.metadata, metadata);
    }
}
