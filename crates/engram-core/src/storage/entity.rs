//! Typed entity storage wrapper.

use std::sync::Arc;

use anyhow::Result;
use engram_storage::Storage;

use super::{distance_to_similarity, EF_SEARCH};
use crate::models::{EntityType, TrackedEntity};

/// Typed wrapper around the byte-level entity store plus its vector index.
#[derive(Clone)]
pub struct EntityStorage {
    inner: Arc<Storage>,
}

impl EntityStorage {
    pub fn new(inner: Arc<Storage>) -> Self {
        Self { inner }
    }

    /// Store an entity (insert or overwrite). The dedup index keeps repeated
    /// writes for the same `(company, type, lowercased name)` on one row.
    pub fn put(&self, entity: &TrackedEntity) -> Result<()> {
        let bytes = serde_json::to_vec(entity)?;
        self.inner.entities.put_raw(
            &entity.id,
            &entity.company_id,
            entity.entity_type.as_str(),
            &entity.entity_name,
            &bytes,
        )?;
        if let Some(embedding) = &entity.embedding {
            self.inner.entity_vectors.add(&entity.id, embedding)?;
        }
        Ok(())
    }

    /// Load an entity by ID.
    pub fn get(&self, entity_id: &str) -> Result<Option<TrackedEntity>> {
        match self.inner.entities.get_raw(entity_id)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Find an entity by its dedup key. Name matching is case-insensitive.
    pub fn find(
        &self,
        company_id: &str,
        entity_type: &EntityType,
        entity_name: &str,
    ) -> Result<Option<TrackedEntity>> {
        match self
            .inner
            .entities
            .find_by_name(company_id, entity_type.as_str(), entity_name)?
        {
            Some(entity_id) => self.get(&entity_id),
            None => Ok(None),
        }
    }

    /// List all entities for a company.
    pub fn list_by_company(&self, company_id: &str) -> Result<Vec<TrackedEntity>> {
        let rows = self.inner.entities.list_by_company_raw(company_id)?;
        let mut entities = Vec::with_capacity(rows.len());
        for (_, bytes) in rows {
            entities.push(serde_json::from_slice::<TrackedEntity>(&bytes)?);
        }
        Ok(entities)
    }

    /// Similarity search scoped to one company, optionally restricted to an
    /// entity type.
    pub fn search(
        &self,
        company_id: &str,
        query: &[f32],
        entity_type: Option<&EntityType>,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<(TrackedEntity, f32)>> {
        let entities = self.list_by_company(company_id)?;
        let allowed: Vec<String> = entities
            .iter()
            .filter(|e| entity_type.is_none_or(|t| &e.entity_type == t))
            .map(|e| e.id.clone())
            .collect();

        let matches = self
            .inner
            .entity_vectors
            .search_filtered(query, limit, EF_SEARCH, &allowed)?;

        let mut results = Vec::new();
        for (entity_id, distance) in matches {
            let similarity = distance_to_similarity(distance);
            if similarity < threshold {
                continue;
            }
            if let Some(entity) = self.get(&entity_id)? {
                results.push((entity, similarity));
            }
        }
        Ok(results)
    }

    /// Most frequently mentioned entities, no embedding involved.
    pub fn frequent(
        &self,
        company_id: &str,
        entity_type: Option<&EntityType>,
        limit: usize,
    ) -> Result<Vec<TrackedEntity>> {
        let mut entities: Vec<TrackedEntity> = self
            .list_by_company(company_id)?
            .into_iter()
            .filter(|e| entity_type.is_none_or(|t| &e.entity_type == t))
            .collect();
        entities.sort_by(|a, b| {
            b.interaction_count
                .cmp(&a.interaction_count)
                .then(b.last_interaction.cmp(&a.last_interaction))
        });
        entities.truncate(limit);
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_storage::VectorConfig;
    use tempfile::tempdir;

    fn storage() -> (EntityStorage, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let inner = Storage::new(
            dir.path().join("test.db"),
            VectorConfig {
                dimension: 4,
                ..Default::default()
            },
        )
        .unwrap();
        (EntityStorage::new(Arc::new(inner)), dir)
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let (store, _dir) = storage();
        let entity = TrackedEntity::new("company-1", "user-1", EntityType::Client, "Acme Corp");
        store.put(&entity).unwrap();

        let found = store
            .find("company-1", &EntityType::Client, "ACME CORP")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, entity.id);
        assert_eq!(found.entity_name, "Acme Corp");
    }

    #[test]
    fn test_frequent_ranking() {
        let (store, _dir) = storage();
        let mut quiet = TrackedEntity::new("company-1", "user-1", EntityType::Client, "Quiet Co");
        quiet.interaction_count = 1;
        let mut busy = TrackedEntity::new("company-1", "user-1", EntityType::Client, "Busy Inc");
        busy.interaction_count = 7;
        let product = TrackedEntity::new("company-1", "user-1", EntityType::Product, "Widget");
        store.put(&quiet).unwrap();
        store.put(&busy).unwrap();
        store.put(&product).unwrap();

        let top = store
            .frequent("company-1", Some(&EntityType::Client), 10)
            .unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].entity_name, "Busy Inc");
    }

    #[test]
    fn test_search_respects_type_filter() {
        let (store, _dir) = storage();
        let client = TrackedEntity::new("company-1", "user-1", EntityType::Client, "Acme")
            .with_embedding(vec![1.0, 0.0, 0.0, 0.0], "test-model".to_string());
        let product = TrackedEntity::new("company-1", "user-1", EntityType::Product, "Acme Paint")
            .with_embedding(vec![0.99, 0.01, 0.0, 0.0], "test-model".to_string());
        store.put(&client).unwrap();
        store.put(&product).unwrap();

        let results = store
            .search(
                "company-1",
                &[1.0, 0.0, 0.0, 0.0],
                Some(&EntityType::Product),
                0.5,
                5,
            )
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.id, product.id);
    }
}
