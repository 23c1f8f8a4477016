//! The outward memory engine facade.
//!
//! A turn has two halves. `begin_turn` resolves the session and assembles
//! the retrieval context the assistant should see. After the assistant
//! replies (and possibly executes an action), `record_turn` writes
//! everything back: buffer, extracted entities, long-term memory, action
//! templates and the summarization pass.

use std::path::Path;
use std::sync::Arc;

use engram_ai::{Embedder, LlmClient, OpenAiClient, OpenAiEmbedding};
use engram_storage::{Storage, VectorConfig};

use crate::buffer::BufferManager;
use crate::config::EngineConfig;
use crate::entity::EntityManager;
use crate::models::{ActionData, ActionType, MessageRole, Session};
use crate::rag::RagCoordinator;
use crate::session::SessionManager;
use crate::storage::{ChunkStorage, EntityStorage, SessionStorage, TemplateStorage};
use crate::template::ActionTemplateManager;

/// Result of one executed action, reported back by the caller.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub action_type: ActionType,
    /// The user request that triggered the action
    pub request: String,
    pub data: ActionData,
    pub success: bool,
}

/// What `begin_turn` hands to the caller.
#[derive(Debug)]
pub struct TurnContext {
    pub session: Session,
    /// Rendered context block to prepend to the assistant prompt
    pub rendered_context: String,
}

pub struct MemoryEngine {
    sessions: Arc<SessionManager>,
    buffer: BufferManager,
    entities: EntityManager,
    templates: ActionTemplateManager,
    rag: RagCoordinator,
}

impl MemoryEngine {
    pub fn new(
        storage: Arc<Storage>,
        llm: Arc<dyn LlmClient>,
        embedder: Arc<Embedder>,
        config: EngineConfig,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(
            SessionStorage::new(storage.clone()),
            config.clone(),
        ));
        let chunks = ChunkStorage::new(storage.clone());
        let entities = EntityManager::new(
            EntityStorage::new(storage.clone()),
            llm.clone(),
            embedder.clone(),
            config.clone(),
        );
        let templates = ActionTemplateManager::new(
            TemplateStorage::new(storage),
            embedder.clone(),
            config.clone(),
        );
        let rag = RagCoordinator::new(
            chunks.clone(),
            entities.clone(),
            templates.clone(),
            embedder.clone(),
            config.clone(),
        );
        let buffer = BufferManager::new(chunks, sessions.clone(), llm, embedder, config);

        Self {
            sessions,
            buffer,
            entities,
            templates,
            rag,
        }
    }

    /// Build an engine backed by OpenAI providers. Credentials come from
    /// the environment and fail fast; models and the embedding dimension
    /// come from the config.
    pub fn from_env(db_path: impl AsRef<Path>, config: EngineConfig) -> anyhow::Result<Self> {
        let api_key = crate::config::openai_api_key()?;
        let llm: Arc<dyn LlmClient> =
            Arc::new(OpenAiClient::new(api_key.clone()).with_model(&config.chat_model));
        let embedder = Arc::new(Embedder::new(Arc::new(OpenAiEmbedding::new(
            api_key,
            Some(config.embedding_model.clone()),
        ))));
        let storage = Arc::new(Storage::new(
            db_path,
            VectorConfig {
                dimension: config.embedding_dimension,
                ..VectorConfig::default()
            },
        )?);
        Ok(Self::new(storage, llm, embedder, config))
    }

    /// Resolve the session and assemble the retrieval context for a turn.
    pub async fn begin_turn(
        &self,
        session_id: Option<&str>,
        user_id: &str,
        company_id: &str,
        message: &str,
    ) -> TurnContext {
        let session = self.sessions.get_or_create(session_id, user_id, company_id);
        let ctx = self.rag.build_context(&session, message).await;
        let rendered_context = self.rag.format_context(&ctx);
        TurnContext {
            session,
            rendered_context,
        }
    }

    /// Write one completed exchange back into memory. Every side effect is
    /// best-effort; the turn itself cannot fail.
    pub async fn record_turn(
        &self,
        session: &mut Session,
        user_message: &str,
        assistant_response: &str,
        outcome: Option<ActionOutcome>,
    ) {
        self.sessions
            .add_message(session, MessageRole::User, user_message);
        self.sessions
            .add_message(session, MessageRole::Assistant, assistant_response);

        let extracted = self.entities.extract(user_message, session).await;
        if !extracted.is_empty() {
            self.entities.update_active(session, &extracted);
            let entities = self.entities.clone();
            let company_id = session.company_id.clone();
            let user_id = session.user_id.clone();
            tokio::spawn(async move {
                entities
                    .persist_extracted(&company_id, &user_id, &extracted)
                    .await;
            });
        }

        let successful_action = outcome
            .as_ref()
            .filter(|o| o.success)
            .map(|o| o.action_type.clone());
        self.buffer
            .store_conversation(
                session,
                user_message,
                assistant_response,
                successful_action.as_ref(),
            )
            .await;

        if let Some(outcome) = outcome {
            if self
                .templates
                .should_store(&outcome.action_type, outcome.success)
            {
                self.remember_action(session, outcome).await;
            }
        }

        if self.sessions.should_summarize(session) {
            self.buffer.summarize_older(session).await;
        }

        self.sessions.update(session);
    }

    async fn remember_action(&self, session: &Session, outcome: ActionOutcome) {
        match self
            .templates
            .find_matching(&session.company_id, &outcome.action_type, &outcome.request)
            .await
        {
            Ok(Some(template)) => {
                tracing::debug!(template_id = %template.id, "Action matched existing template");
            }
            Ok(None) => {
                if let Err(e) = self
                    .templates
                    .store(
                        session,
                        outcome.action_type,
                        &outcome.request,
                        outcome.data,
                        None,
                    )
                    .await
                {
                    tracing::warn!(error = %e, "Failed to store action template");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Template matching failed");
            }
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn entities(&self) -> &EntityManager {
        &self.entities
    }

    pub fn templates(&self) -> &ActionTemplateManager {
        &self.templates
    }

    pub fn rag(&self) -> &RagCoordinator {
        &self.rag
    }

    pub fn buffer(&self) -> &BufferManager {
        &self.buffer
    }
}
