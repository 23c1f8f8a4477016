//! Entity extraction and persistent entity memory.
//!
//! Every user message passes through one extraction completion; the result
//! merges into the session's working set immediately, while durable upserts
//! run as spawned best-effort tasks. Extraction is allowed to fail silently:
//! a missed entity costs a little context, a failed turn costs the user.

use std::sync::Arc;

use anyhow::Result;

use engram_ai::json_extract::extract_json_object;
use engram_ai::{CompletionRequest, Embedder, LlmClient, Message};
use engram_storage::time_utils;

use crate::config::EngineConfig;
use crate::models::{
    ActiveEntities, ActiveEntity, EntityAttributes, EntityType, ExtractedEntities, Session,
    TrackedEntity,
};
use crate::storage::EntityStorage;

pub const EXTRACT_ENTITIES_PROMPT: &str = include_str!("prompts/extract_entities.md");

#[derive(Clone)]
pub struct EntityManager {
    storage: EntityStorage,
    llm: Arc<dyn LlmClient>,
    embedder: Arc<Embedder>,
    config: EngineConfig,
}

impl EntityManager {
    pub fn new(
        storage: EntityStorage,
        llm: Arc<dyn LlmClient>,
        embedder: Arc<Embedder>,
        config: EngineConfig,
    ) -> Self {
        Self {
            storage,
            llm,
            embedder,
            config,
        }
    }

    /// Pull entities out of one user message. Any failure, from transport to
    /// malformed JSON, collapses to the all-empty default.
    pub async fn extract(&self, message: &str, session: &Session) -> ExtractedEntities {
        let request = CompletionRequest::new(vec![
            Message::system(EXTRACT_ENTITIES_PROMPT),
            Message::user(message),
        ])
        .with_temperature(0.0);

        let response = match self.llm.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "Entity extraction failed");
                return ExtractedEntities::default();
            }
        };

        let Some(value) = extract_json_object(&response.content) else {
            tracing::warn!(
                session_id = %session.id,
                "Entity extraction returned no parseable JSON"
            );
            return ExtractedEntities::default();
        };

        serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!(session_id = %session.id, error = %e, "Entity extraction JSON had unexpected shape");
            ExtractedEntities::default()
        })
    }

    /// Merge extracted entities into the session working set. Matching is
    /// case-insensitive; existing entries refresh their mention timestamp,
    /// preferences shallow-merge with later values winning, and the intent
    /// is only replaced by a non-empty one.
    pub fn update_active(&self, session: &mut Session, extracted: &ExtractedEntities) {
        let now = time_utils::now_ms();
        merge_names(&mut session.active_entities.clients, &extracted.clients, now);
        merge_names(
            &mut session.active_entities.products,
            &extracted.products,
            now,
        );

        for (key, value) in &extracted.preferences {
            session
                .active_entities
                .preferences
                .insert(key.clone(), value.clone());
        }

        if let Some(intent) = &extracted.intent {
            if !intent.trim().is_empty() {
                session.active_entities.current_intent = Some(intent.clone());
            }
        }
    }

    /// Insert or refresh a durable entity record. An existing row (matched
    /// case-insensitively per company and type) bumps its interaction count
    /// and backfills missing attributes; a new one is embedded and inserted.
    pub async fn upsert(
        &self,
        company_id: &str,
        user_id: &str,
        entity_type: EntityType,
        name: &str,
        attributes: EntityAttributes,
    ) -> Result<TrackedEntity> {
        if let Some(mut existing) = self.storage.find(company_id, &entity_type, name)? {
            existing.record_interaction();
            existing.attributes.merge_missing(&attributes);
            self.storage.put(&existing)?;
            return Ok(existing);
        }

        let mut entity = TrackedEntity::new(company_id, user_id, entity_type, name)
            .with_attributes(attributes);
        if let Some(embedding) = self
            .embedder
            .embed_with_retry(&entity.embedding_text(), self.config.embed_retries)
            .await
        {
            entity = entity.with_embedding(embedding, self.embedder.model_name().to_string());
        }
        self.storage.put(&entity)?;
        Ok(entity)
    }

    /// Persist one extraction result. Failures are logged per entity and
    /// never visible to the caller; meant to run as a spawned task.
    pub async fn persist_extracted(
        &self,
        company_id: &str,
        user_id: &str,
        extracted: &ExtractedEntities,
    ) {
        for name in &extracted.clients {
            if let Err(e) = self
                .upsert(
                    company_id,
                    user_id,
                    EntityType::Client,
                    name,
                    EntityAttributes::default(),
                )
                .await
            {
                tracing::warn!(entity = %name, error = %e, "Failed to upsert client entity");
            }
        }
        for name in &extracted.products {
            if let Err(e) = self
                .upsert(
                    company_id,
                    user_id,
                    EntityType::Product,
                    name,
                    EntityAttributes::default(),
                )
                .await
            {
                tracing::warn!(entity = %name, error = %e, "Failed to upsert product entity");
            }
        }
    }

    /// Similarity search over the company's entities. An embedding failure
    /// degrades to no results.
    pub async fn search(
        &self,
        company_id: &str,
        query: &str,
        entity_type: Option<&EntityType>,
        limit: usize,
    ) -> Vec<(TrackedEntity, f32)> {
        let Some(embedding) = self
            .embedder
            .embed_with_retry(query, self.config.embed_retries)
            .await
        else {
            return Vec::new();
        };

        match self.storage.search(
            company_id,
            &embedding,
            entity_type,
            self.config.retrieval_threshold,
            limit,
        ) {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(error = %e, "Entity search failed");
                Vec::new()
            }
        }
    }

    /// Most frequently mentioned entities, no provider call involved.
    pub fn frequent(
        &self,
        company_id: &str,
        entity_type: Option<&EntityType>,
        limit: usize,
    ) -> Vec<TrackedEntity> {
        match self.storage.frequent(company_id, entity_type, limit) {
            Ok(entities) => entities,
            Err(e) => {
                tracing::warn!(error = %e, "Frequent entity lookup failed");
                Vec::new()
            }
        }
    }

    /// Deterministic rendering of the working set. Empty sections are
    /// omitted entirely.
    pub fn format_active_for_prompt(&self, active: &ActiveEntities) -> String {
        let mut sections = Vec::new();

        if !active.clients.is_empty() {
            let names: Vec<&str> = active.clients.iter().map(|e| e.name.as_str()).collect();
            sections.push(format!("Clients: {}", names.join(", ")));
        }
        if !active.products.is_empty() {
            let names: Vec<&str> = active.products.iter().map(|e| e.name.as_str()).collect();
            sections.push(format!("Products: {}", names.join(", ")));
        }
        if !active.preferences.is_empty() {
            let prefs: Vec<String> = active
                .preferences
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect();
            sections.push(format!("Preferences: {}", prefs.join("; ")));
        }
        if let Some(intent) = &active.current_intent {
            sections.push(format!("Intent: {intent}"));
        }

        sections.join("\n")
    }
}

fn merge_names(existing: &mut Vec<ActiveEntity>, incoming: &[String], now: i64) {
    for name in incoming {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            continue;
        }
        match existing
            .iter_mut()
            .find(|e| e.name.eq_ignore_ascii_case(trimmed))
        {
            Some(entry) => entry.last_mentioned = now,
            None => {
                let mut entry = ActiveEntity::new(trimmed);
                entry.last_mentioned = now;
                existing.push(entry);
            }
        }
    }
}
