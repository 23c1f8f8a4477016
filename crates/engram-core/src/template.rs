//! Action template learning: remember successful state-changing actions and
//! reuse them as few-shot examples.
//!
//! Only allow-listed action types become templates. Near-duplicate requests
//! reinforce the existing template's success count instead of growing the
//! table.

use std::sync::Arc;

use anyhow::Result;

use engram_ai::Embedder;

use crate::config::EngineConfig;
use crate::models::{ActionData, ActionTemplate, ActionType, Session};
use crate::storage::TemplateStorage;

#[derive(Clone)]
pub struct ActionTemplateManager {
    storage: TemplateStorage,
    embedder: Arc<Embedder>,
    config: EngineConfig,
}

impl ActionTemplateManager {
    pub fn new(storage: TemplateStorage, embedder: Arc<Embedder>, config: EngineConfig) -> Self {
        Self {
            storage,
            embedder,
            config,
        }
    }

    /// Gate for template creation: only successful, state-changing actions
    /// qualify.
    pub fn should_store(&self, action_type: &ActionType, success: bool) -> bool {
        success && action_type.is_state_changing()
    }

    /// Store a new template for a successful action. The example request is
    /// embedded for later matching; a missing intent gets a per-type
    /// generated one.
    pub async fn store(
        &self,
        session: &Session,
        action_type: ActionType,
        request: &str,
        action_data: ActionData,
        intent: Option<String>,
    ) -> Result<ActionTemplate> {
        let intent = intent.unwrap_or_else(|| generate_intent(&action_type));
        let mut template = ActionTemplate::new(
            &session.company_id,
            &session.user_id,
            action_type,
            intent,
            request,
            action_data,
        );
        if let Some(embedding) = self
            .embedder
            .embed_with_retry(request, self.config.embed_retries)
            .await
        {
            template = template.with_embedding(embedding, self.embedder.model_name().to_string());
        }
        self.storage.put(&template)?;
        Ok(template)
    }

    /// Look for an existing template close enough to this request. A hit at
    /// or above the dedup threshold reinforces the template and returns it;
    /// anything weaker means the caller should store a new one.
    pub async fn find_matching(
        &self,
        company_id: &str,
        action_type: &ActionType,
        request: &str,
    ) -> Result<Option<ActionTemplate>> {
        let Some(embedding) = self
            .embedder
            .embed_with_retry(request, self.config.embed_retries)
            .await
        else {
            return Ok(None);
        };

        let matches = self.storage.search(
            company_id,
            &embedding,
            Some(action_type),
            self.config.template_dedup_threshold,
            1,
        )?;

        match matches.into_iter().next() {
            Some((template, similarity)) => {
                tracing::debug!(
                    template_id = %template.id,
                    similarity,
                    "Reinforcing existing action template"
                );
                self.storage.increment_success(&template.id)?;
                Ok(self.storage.get(&template.id)?)
            }
            None => Ok(None),
        }
    }

    /// Similarity search over stored templates. Embedding failure degrades
    /// to no results.
    pub async fn search(
        &self,
        company_id: &str,
        query: &str,
        action_type: Option<&ActionType>,
        limit: usize,
    ) -> Vec<(ActionTemplate, f32)> {
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
            action_type,
            self.config.retrieval_threshold,
            limit,
        ) {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(error = %e, "Template search failed");
                Vec::new()
            }
        }
    }

    pub fn increment_success(&self, template_id: &str) -> Result<()> {
        self.storage.increment_success(template_id)
    }

    /// Most successful templates for an action type.
    pub fn top(
        &self,
        company_id: &str,
        action_type: &ActionType,
        limit: usize,
    ) -> Result<Vec<ActionTemplate>> {
        self.storage.top(company_id, action_type, limit)
    }

    /// Numbered few-shot rendering for the prompt.
    pub fn format_for_prompt(&self, templates: &[ActionTemplate]) -> String {
        if templates.is_empty() {
            return String::new();
        }

        let mut lines = Vec::with_capacity(templates.len() + 1);
        for (i, template) in templates.iter().enumerate() {
            lines.push(format!(
                "{}. [{}] ({} uses) \"{}\" -> {}",
                i + 1,
                template.action_type.as_str(),
                template.success_count,
                template.example_request,
                template.intent_description,
            ));
        }
        lines.push(
            "These are past successful actions; prefer their structure when the request is similar."
                .to_string(),
        );
        lines.join("\n")
    }
}

fn generate_intent(action_type: &ActionType) -> String {
    match action_type {
        ActionType::CreateInvoice => "Create and send an invoice".to_string(),
        ActionType::CreateProposal => "Prepare a proposal for a client".to_string(),
        ActionType::SendEmail => "Send an email on the user's behalf".to_string(),
        ActionType::CreateTask => "Create a follow-up task".to_string(),
        ActionType::CreateCalendarEvent => "Schedule a calendar event".to_string(),
        ActionType::Other(name) => format!("Perform {name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_ai::MockEmbedding;
    use engram_storage::{Storage, VectorConfig};
    use tempfile::tempdir;

    fn manager() -> (ActionTemplateManager, TemplateStorage, tempfile::TempDir) {
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
        let templates = TemplateStorage::new(storage);
        let embedder = Arc::new(Embedder::new(Arc::new(MockEmbedding::new(8))));
        let manager =
            ActionTemplateManager::new(templates.clone(), embedder, EngineConfig::default());
        (manager, templates, dir)
    }

    #[test]
    fn test_should_store_allow_list() {
        let (manager, _, _dir) = manager();
        assert!(manager.should_store(&ActionType::CreateInvoice, true));
        assert!(!manager.should_store(&ActionType::CreateInvoice, false));
        assert!(!manager.should_store(&ActionType::Other("search_products".to_string()), true));
    }

    #[tokio::test]
    async fn test_dedup_reinforces_instead_of_duplicating() {
        let (manager, storage, _dir) = manager();
        let session = Session::new("user-1", "company-1");
        let request = "invoice Acme for 10 widgets";

        let stored = manager
            .store(
                &session,
                ActionType::CreateInvoice,
                request,
                ActionData::Freeform(serde_json::json!({})),
                None,
            )
            .await
            .unwrap();
        assert_eq!(stored.success_count, 1);

        // The identical request embeds to the identical vector (similarity
        // 1.0, above the 0.9 dedup threshold).
        let matched = manager
            .find_matching("company-1", &ActionType::CreateInvoice, request)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(matched.id, stored.id);
        assert_eq!(matched.success_count, 2);

        let all = storage.list("company-1", None).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_unrelated_request_does_not_match() {
        let (manager, _, _dir) = manager();
        let session = Session::new("user-1", "company-1");

        manager
            .store(
                &session,
                ActionType::CreateInvoice,
                "invoice Acme for 10 widgets",
                ActionData::Freeform(serde_json::json!({})),
                None,
            )
            .await
            .unwrap();

        let matched = manager
            .find_matching(
                "company-1",
                &ActionType::CreateInvoice,
                "schedule quarterly planning meeting with the board",
            )
            .await
            .unwrap();
        assert!(matched.is_none());
    }

    #[tokio::test]
    async fn test_generated_intent_per_type() {
        let (manager, _, _dir) = manager();
        let session = Session::new("user-1", "company-1");
        let template = manager
            .store(
                &session,
                ActionType::SendEmail,
                "email the quote to Sarah",
                ActionData::Freeform(serde_json::json!({})),
                None,
            )
            .await
            .unwrap();
        assert_eq!(template.intent_description, "Send an email on the user's behalf");
    }

    #[test]
    fn test_format_for_prompt() {
        let (manager, _, _dir) = manager();
        assert!(manager.format_for_prompt(&[]).is_empty());

        let template = ActionTemplate::new(
            "company-1",
            "user-1",
            ActionType::CreateInvoice,
            "Create and send an invoice",
            "invoice Acme for 10 widgets",
            ActionData::Freeform(serde_json::json!({})),
        );
        let rendered = manager.format_for_prompt(&[template]);
        assert!(rendered.starts_with("1. [create_invoice] (1 uses)"));
        assert!(rendered.contains("invoice Acme for 10 widgets"));
    }
}
