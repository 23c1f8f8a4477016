//! Buffer summarization and long-term chunk creation.
//!
//! When a session buffer outgrows its bound, the older prefix is folded into
//! the running summary by a completion call and persisted as a summary
//! chunk. The trim itself is unconditional: a failed completion only skips
//! the summary side effects, so the buffer can never grow without bound.

use std::sync::Arc;

use engram_ai::{CompletionRequest, Embedder, LlmClient, Message};

use crate::config::EngineConfig;
use crate::models::{
    ActionType, ChatMessage, ChunkMetadata, ChunkType, MemoryChunk, MessageRole, Session,
};
use crate::session::SessionManager;
use crate::storage::ChunkStorage;

pub const SUMMARIZE_PROMPT: &str = include_str!("prompts/summarize.md");

/// Importance assigned to summary and action-success chunks.
const HIGH_IMPORTANCE: f32 = 0.8;
/// Importance assigned to plain conversation chunks.
const DEFAULT_IMPORTANCE: f32 = 0.5;

pub struct BufferManager {
    chunks: ChunkStorage,
    sessions: Arc<SessionManager>,
    llm: Arc<dyn LlmClient>,
    embedder: Arc<Embedder>,
    config: EngineConfig,
}

impl BufferManager {
    pub fn new(
        chunks: ChunkStorage,
        sessions: Arc<SessionManager>,
        llm: Arc<dyn LlmClient>,
        embedder: Arc<Embedder>,
        config: EngineConfig,
    ) -> Self {
        Self {
            chunks,
            sessions,
            llm,
            embedder,
            config,
        }
    }

    /// The window of messages that goes into the prompt verbatim.
    pub fn context_messages<'a>(&self, session: &'a Session) -> &'a [ChatMessage] {
        let len = session.messages.len();
        let start = len.saturating_sub(self.config.buffer_size);
        &session.messages[start..]
    }

    /// Fold the buffer prefix beyond `buffer_size` into the running summary
    /// and persist it as a summary chunk. Trimming happens before the
    /// completion call and is never rolled back.
    pub async fn summarize_older(&self, session: &mut Session) {
        let trimmed = self
            .sessions
            .trim_messages(session, self.config.buffer_size);
        if trimmed.is_empty() {
            return;
        }

        let transcript = render_transcript(&trimmed);
        let request = CompletionRequest::new(vec![
            Message::system(SUMMARIZE_PROMPT),
            Message::user(transcript),
        ])
        .with_temperature(0.3);

        let summary = match self.llm.complete(request).await {
            Ok(response) if !response.content.trim().is_empty() => response.content,
            Ok(_) => {
                tracing::warn!(session_id = %session.id, "Summarization returned empty text");
                return;
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %session.id,
                    error = %e,
                    "Summarization failed, trimmed messages dropped from buffer"
                );
                return;
            }
        };

        self.sessions
            .update_summary(session, &summary, trimmed.len() as u32);

        let metadata = ChunkMetadata {
            message_count: Some(trimmed.len() as u32),
            from_timestamp: trimmed.first().map(|m| m.timestamp),
            to_timestamp: trimmed.last().map(|m| m.timestamp),
            ..Default::default()
        };
        let chunk = MemoryChunk::new(
            &session.company_id,
            &session.user_id,
            &session.id,
            ChunkType::Summary,
            &summary,
        )
        .with_importance(HIGH_IMPORTANCE)
        .with_metadata(metadata);
        self.store_chunk(chunk).await;
    }

    /// Persist one exchange as long-term memory. A successful action outcome
    /// upgrades the chunk to `ActionSuccess` at high importance.
    pub async fn store_conversation(
        &self,
        session: &Session,
        user_message: &str,
        assistant_response: &str,
        action_type: Option<&ActionType>,
    ) {
        let content = format!("User: {user_message}\nAssistant: {assistant_response}");
        let (chunk_type, importance) = match action_type {
            Some(_) => (ChunkType::ActionSuccess, HIGH_IMPORTANCE),
            None => (ChunkType::Conversation, DEFAULT_IMPORTANCE),
        };

        let mut metadata = ChunkMetadata::default();
        if let Some(action_type) = action_type {
            metadata.action_type = Some(action_type.as_str().to_string());
        }

        let chunk = MemoryChunk::new(
            &session.company_id,
            &session.user_id,
            &session.id,
            chunk_type,
            content,
        )
        .with_importance(importance)
        .with_metadata(metadata);
        self.store_chunk(chunk).await;
    }

    /// Embed and insert a chunk. Embedding failure degrades to storing
    /// without a vector; persistence failure is logged and swallowed.
    pub async fn store_chunk(&self, mut chunk: MemoryChunk) {
        if let Some(embedding) = self
            .embedder
            .embed_with_retry(&chunk.content, self.config.embed_retries)
            .await
        {
            chunk = chunk.with_embedding(embedding, self.embedder.model_name().to_string());
        } else {
            tracing::warn!(
                chunk_id = %chunk.id,
                "Storing chunk without embedding, semantic retrieval will miss it"
            );
        }

        if let Err(e) = self.chunks.put(&chunk) {
            tracing::warn!(chunk_id = %chunk.id, error = %e, "Failed to persist memory chunk");
        }
    }
}

fn render_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                MessageRole::User => "User",
                MessageRole::Assistant => "Assistant",
                MessageRole::System => "System",
            };
            format!("{role}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SessionStorage;
    use engram_ai::{MockEmbedding, MockLlm, MockStep};
    use engram_storage::{Storage, VectorConfig};
    use tempfile::tempdir;

    struct Fixture {
        buffer: BufferManager,
        chunks: ChunkStorage,
        _dir: tempfile::TempDir,
    }

    fn fixture(llm: MockLlm, config: EngineConfig) -> Fixture {
        let dir = tempdir().unwrap();
        let storage = Arc::new(
            Storage::new(
                dir.path().join("test.db"),
                VectorConfig {
                    dimension: 8,
                    ..Default::default()
                },
            )
            .unwrap(),
        );
        let chunks = ChunkStorage::new(storage.clone());
        let sessions = Arc::new(SessionManager::new(
            SessionStorage::new(storage),
            config.clone(),
        ));
        let embedder = Arc::new(Embedder::new(Arc::new(MockEmbedding::new(8))));
        let buffer = BufferManager::new(chunks.clone(), sessions, Arc::new(llm), embedder, config);
        Fixture {
            buffer,
            chunks,
            _dir: dir,
        }
    }

    fn session_with_messages(count: usize) -> Session {
        let mut session = Session::new("user-1", "company-1");
        for i in 0..count {
            let role = if i % 2 == 0 {
                MessageRole::User
            } else {
                MessageRole::Assistant
            };
            session
                .messages
                .push(ChatMessage::new(role, format!("message {i}")));
        }
        session.total_messages = count as u32;
        session
    }

    #[test]
    fn test_context_messages_window() {
        let f = fixture(MockLlm::always("summary"), EngineConfig::default());
        let session = session_with_messages(25);
        let window = f.buffer.context_messages(&session);
        assert_eq!(window.len(), 10);
        assert_eq!(window[0].content, "message 15");

        let short = session_with_messages(3);
        assert_eq!(f.buffer.context_messages(&short).len(), 3);
    }

    #[tokio::test]
    async fn test_summarize_folds_older_prefix() {
        let config = EngineConfig {
            buffer_size: 10,
            max_buffer_messages: 20,
            ..Default::default()
        };
        let f = fixture(
            MockLlm::new(vec![MockStep::text("they discussed widget pricing")]),
            config,
        );
        let mut session = session_with_messages(25);

        f.buffer.summarize_older(&mut session).await;

        assert_eq!(session.messages.len(), 10);
        assert_eq!(session.messages[0].content, "message 15");
        assert_eq!(session.summary_message_count, 15);
        assert_eq!(
            session.conversation_summary.as_deref(),
            Some("they discussed widget pricing")
        );

        let stored = f.chunks.list_by_session(&session.id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].chunk_type, ChunkType::Summary);
        assert_eq!(stored[0].importance, 0.8);
        assert_eq!(stored[0].metadata.message_count, Some(15));
        assert!(stored[0].has_embedding());
    }

    #[tokio::test]
    async fn test_failed_summarization_still_trims() {
        let config = EngineConfig {
            buffer_size: 10,
            max_buffer_messages: 20,
            ..Default::default()
        };
        let f = fixture(MockLlm::new(vec![MockStep::http_error(500)]), config);
        let mut session = session_with_messages(25);

        f.buffer.summarize_older(&mut session).await;

        // The trim holds even though the summary was lost.
        assert_eq!(session.messages.len(), 10);
        assert!(session.conversation_summary.is_none());
        assert_eq!(session.summary_message_count, 0);
        assert!(f.chunks.list_by_session(&session.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_conversation_types() {
        let f = fixture(MockLlm::always("unused"), EngineConfig::default());
        let session = Session::new("user-1", "company-1");

        f.buffer
            .store_conversation(&session, "hi", "hello", None)
            .await;
        f.buffer
            .store_conversation(
                &session,
                "invoice Acme",
                "done",
                Some(&ActionType::CreateInvoice),
            )
            .await;

        let stored = f.chunks.list_by_session(&session.id).unwrap();
        assert_eq!(stored.len(), 2);

        let plain = stored
            .iter()
            .find(|c| c.chunk_type == ChunkType::Conversation)
            .unwrap();
        assert_eq!(plain.importance, 0.5);

        let action = stored
            .iter()
            .find(|c| c.chunk_type == ChunkType::ActionSuccess)
            .unwrap();
        assert_eq!(action.importance, 0.8);
        assert_eq!(action.metadata.action_type.as_deref(), Some("create_invoice"));
    }

    #[tokio::test]
    async fn test_embedding_failure_degrades_to_plain_storage() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(
            Storage::new(
                dir.path().join("test.db"),
                VectorConfig {
                    dimension: 8,
                    ..Default::default()
                },
            )
            .unwrap(),
        );
        let config = EngineConfig {
            embed_retries: 0,
            ..Default::default()
        };
        let chunks = ChunkStorage::new(storage.clone());
        let sessions = Arc::new(SessionManager::new(
            SessionStorage::new(storage),
            config.clone(),
        ));
        let embedder = Arc::new(Embedder::new(Arc::new(MockEmbedding::failing_first(8, 100))));
        let buffer = BufferManager::new(
            chunks.clone(),
            sessions,
            Arc::new(MockLlm::always("unused")),
            embedder,
            config,
        );

        let session = Session::new("user-1", "company-1");
        buffer.store_conversation(&session, "hi", "hello", None).await;

        let stored = chunks.list_by_session(&session.id).unwrap();
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].has_embedding());
    }
}
