//! Retrieval-augmented context assembly.
//!
//! One call per turn fans out over long-term chunks, entity memory and
//! action templates in parallel, merges the hits with the session's local
//! state (buffer, running summary, working set) and renders a deterministic
//! context block. Every retrieval arm degrades to empty on its own failure;
//! a broken index never blocks a reply.

use std::sync::Arc;

use engram_ai::Embedder;

use crate::config::EngineConfig;
use crate::entity::EntityManager;
use crate::models::{
    ActionTemplate, ActiveEntities, ChatMessage, ChunkType, MemoryChunk, Session, TrackedEntity,
};
use crate::storage::ChunkStorage;
use crate::template::ActionTemplateManager;

/// Everything retrieval produced for one turn.
#[derive(Debug, Default)]
pub struct RetrievedContext {
    pub summary: Option<String>,
    /// The verbatim tail of the buffer, for the caller's prompt assembly.
    /// Not part of the rendered context block.
    pub recent_messages: Vec<ChatMessage>,
    pub past_interactions: Vec<(MemoryChunk, f32)>,
    pub active: ActiveEntities,
    pub related_entities: Vec<(TrackedEntity, f32)>,
    pub templates: Vec<(ActionTemplate, f32)>,
}

#[derive(Clone)]
pub struct RagCoordinator {
    chunks: ChunkStorage,
    entities: EntityManager,
    templates: ActionTemplateManager,
    embedder: Arc<Embedder>,
    config: EngineConfig,
}

impl RagCoordinator {
    pub fn new(
        chunks: ChunkStorage,
        entities: EntityManager,
        templates: ActionTemplateManager,
        embedder: Arc<Embedder>,
        config: EngineConfig,
    ) -> Self {
        Self {
            chunks,
            entities,
            templates,
            embedder,
            config,
        }
    }

    /// Thresholded chunk retrieval scoped to one company. Each hit gets a
    /// spawned access bump; the bump failing (or racing) never affects the
    /// result.
    pub async fn retrieve(
        &self,
        company_id: &str,
        query: &str,
        types: Option<&[ChunkType]>,
        threshold: f32,
        limit: usize,
    ) -> Vec<(MemoryChunk, f32)> {
        let Some(embedding) = self
            .embedder
            .embed_with_retry(query, self.config.embed_retries)
            .await
        else {
            return Vec::new();
        };

        let results = match self
            .chunks
            .search(company_id, &embedding, types, threshold, limit)
        {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(error = %e, "Chunk retrieval failed");
                return Vec::new();
            }
        };

        for (chunk, _) in &results {
            let chunks = self.chunks.clone();
            let chunk_id = chunk.id.clone();
            tokio::spawn(async move {
                if let Err(e) = chunks.bump_access(&chunk_id) {
                    tracing::warn!(chunk_id = %chunk_id, error = %e, "Access bump failed");
                }
            });
        }

        results
    }

    /// Assemble the full retrieval context for a turn. The three remote arms
    /// run in parallel; summary and working set are local reads.
    pub async fn build_context(&self, session: &Session, message: &str) -> RetrievedContext {
        let limit = self.config.retrieval_limit;
        let threshold = self.config.retrieval_threshold;

        let (past_interactions, related_entities, templates) = tokio::join!(
            self.retrieve(&session.company_id, message, None, threshold, limit),
            self.entities
                .search(&session.company_id, message, None, limit),
            self.templates
                .search(&session.company_id, message, None, limit),
        );

        tracing::debug!(
            session_id = %session.id,
            chunks = past_interactions.len(),
            entities = related_entities.len(),
            templates = templates.len(),
            "Retrieval fan-out complete"
        );

        let tail = session
            .messages
            .len()
            .saturating_sub(self.config.buffer_size);
        RetrievedContext {
            summary: session.conversation_summary.clone(),
            recent_messages: session.messages[tail..].to_vec(),
            past_interactions,
            active: session.active_entities.clone(),
            related_entities,
            templates,
        }
    }

    /// Render the context block. Section order is fixed; empty sections are
    /// omitted.
    pub fn format_context(&self, ctx: &RetrievedContext) -> String {
        let mut sections = Vec::new();

        if let Some(summary) = &ctx.summary {
            if !summary.trim().is_empty() {
                sections.push(format!("Summary:\n{summary}"));
            }
        }

        if !ctx.past_interactions.is_empty() {
            let lines: Vec<String> = ctx
                .past_interactions
                .iter()
                .map(|(chunk, _)| format!("- {}", chunk.content))
                .collect();
            sections.push(format!("Relevant Past Interactions:\n{}", lines.join("\n")));
        }

        let mut discussed: Vec<&str> = ctx.active.clients.iter().map(|e| e.name.as_str()).collect();
        discussed.extend(ctx.active.products.iter().map(|e| e.name.as_str()));
        if !discussed.is_empty() {
            sections.push(format!("Currently Discussed: {}", discussed.join(", ")));
        }

        if let Some(intent) = &ctx.active.current_intent {
            sections.push(format!("Current Intent: {intent}"));
        }

        if !ctx.active.preferences.is_empty() {
            let prefs: Vec<String> = ctx
                .active
                .preferences
                .iter()
                .map(|(k, v)| format!("- {k}: {v}"))
                .collect();
            sections.push(format!("User Preferences:\n{}", prefs.join("\n")));
        }

        if !ctx.related_entities.is_empty() {
            let lines: Vec<String> = ctx
                .related_entities
                .iter()
                .map(|(entity, _)| {
                    format!(
                        "- {}: {} ({} interactions)",
                        entity.entity_type.as_str(),
                        entity.entity_name,
                        entity.interaction_count
                    )
                })
                .collect();
            sections.push(format!("Related History:\n{}", lines.join("\n")));
        }

        if !ctx.templates.is_empty() {
            let templates: Vec<ActionTemplate> =
                ctx.templates.iter().map(|(t, _)| t.clone()).collect();
            sections.push(format!(
                "Similar Successful Actions:\n{}",
                self.templates.format_for_prompt(&templates)
            ));
        }

        sections.join("\n\n")
    }
}
