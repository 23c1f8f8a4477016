//! Typed action template storage wrapper.

use std::sync::Arc;

use anyhow::Result;
use engram_storage::Storage;

use super::{distance_to_similarity, EF_SEARCH};
use crate::models::{ActionTemplate, ActionType};

/// Typed wrapper around the byte-level template store plus its vector index.
#[derive(Clone)]
pub struct TemplateStorage {
    inner: Arc<Storage>,
}

impl TemplateStorage {
    pub fn new(inner: Arc<Storage>) -> Self {
        Self { inner }
    }

    /// Store a template (insert or overwrite).
    pub fn put(&self, template: &ActionTemplate) -> Result<()> {
        let bytes = serde_json::to_vec(template)?;
        self.inner.templates.put_raw(
            &template.id,
            &template.company_id,
            template.action_type.as_str(),
            &bytes,
        )?;
        if let Some(embedding) = &template.embedding {
            self.inner.template_vectors.add(&template.id, embedding)?;
        }
        Ok(())
    }

    /// Load a template by ID.
    pub fn get(&self, template_id: &str) -> Result<Option<ActionTemplate>> {
        match self.inner.templates.get_raw(template_id)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// List templates for a company, optionally scoped to one action type.
    pub fn list(
        &self,
        company_id: &str,
        action_type: Option<&ActionType>,
    ) -> Result<Vec<ActionTemplate>> {
        let ids = self
            .inner
            .templates
            .list_ids(company_id, action_type.map(|t| t.as_str()))?;
        let mut templates = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(template) = self.get(&id)? {
                templates.push(template);
            }
        }
        Ok(templates)
    }

    /// Similarity search scoped to one company (+type).
    pub fn search(
        &self,
        company_id: &str,
        query: &[f32],
        action_type: Option<&ActionType>,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<(ActionTemplate, f32)>> {
        let allowed = self
            .inner
            .templates
            .list_ids(company_id, action_type.map(|t| t.as_str()))?;

        let matches = self
            .inner
            .template_vectors
            .search_filtered(query, limit, EF_SEARCH, &allowed)?;

        let mut results = Vec::new();
        for (template_id, distance) in matches {
            let similarity = distance_to_similarity(distance);
            if similarity < threshold {
                continue;
            }
            if let Some(template) = self.get(&template_id)? {
                results.push((template, similarity));
            }
        }
        Ok(results)
    }

    /// Best-effort success counter bump. Missing templates are a no-op.
    pub fn increment_success(&self, template_id: &str) -> Result<()> {
        if let Some(mut template) = self.get(template_id)? {
            template.success_count = template.success_count.saturating_add(1);
            self.put(&template)?;
        }
        Ok(())
    }

    /// Most successful templates for an action type, best first.
    pub fn top(
        &self,
        company_id: &str,
        action_type: &ActionType,
        limit: usize,
    ) -> Result<Vec<ActionTemplate>> {
        let mut templates = self.list(company_id, Some(action_type))?;
        templates.sort_by(|a, b| {
            b.success_count
                .cmp(&a.success_count)
                .then(b.created_at.cmp(&a.created_at))
        });
        templates.truncate(limit);
        Ok(templates)
    }
}
