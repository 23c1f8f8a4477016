//! Vector storage using HNSW for approximate nearest neighbor search.
//!
//! Provides per-record-family vector storage with persistence to redb. The
//! HNSW index is kept in memory for fast search, with vectors persisted to a
//! shared table (keyed by `namespace:record_id`) for durability. Each family
//! (chunks, entities, templates) owns one [`VectorStore`] instance and only
//! loads its own namespace on open, so all vectors inside one instance share
//! a fixed dimension.

use anyhow::Result;
use hnsw_rs::prelude::*;
use parking_lot::RwLock;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

type VectorIndex = Hnsw<'static, f32, DistCosine>;

const VECTOR_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("vectors");

/// Configuration for vector storage.
#[derive(Debug, Clone)]
pub struct VectorConfig {
    /// Vector dimension (e.g., 1536 for OpenAI text-embedding-3-small)
    pub dimension: usize,
    /// Maximum number of connections per node (16-64 typical)
    pub max_connections: usize,
    /// Search width during construction (200-800 typical)
    pub ef_construction: usize,
    /// Maximum elements to store
    pub max_elements: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            dimension: 1536,
            max_connections: 16,
            ef_construction: 200,
            max_elements: 100_000,
        }
    }
}

/// A nearest-neighbour match: record ID plus cosine distance.
pub type VectorMatch = (String, f32);

/// Low-level vector storage with HNSW index, scoped to one namespace.
pub struct VectorStore {
    db: Arc<Database>,
    namespace: &'static str,
    config: VectorConfig,
    /// HNSW index (in-memory, rebuilt on load)
    index: RwLock<VectorIndex>,
    /// record_id -> internal vector ID
    id_map: RwLock<HashMap<String, usize>>,
    /// internal vector ID -> record_id
    reverse_map: RwLock<HashMap<usize, String>>,
    /// Next available vector ID
    next_id: RwLock<usize>,
}

impl VectorStore {
    /// Create new vector storage, loading existing vectors for the namespace.
    pub fn new(db: Arc<Database>, namespace: &'static str, config: VectorConfig) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(VECTOR_TABLE)?;
        write_txn.commit()?;

        let hnsw: VectorIndex = Hnsw::new(
            config.max_connections,
            config.max_elements,
            16,
            config.ef_construction,
            DistCosine,
        );

        let store = Self {
            db,
            namespace,
            config,
            index: RwLock::new(hnsw),
            id_map: RwLock::new(HashMap::new()),
            reverse_map: RwLock::new(HashMap::new()),
            next_id: RwLock::new(0),
        };

        store.rebuild_index()?;
        Ok(store)
    }

    /// Add a vector for a record.
    pub fn add(&self, record_id: &str, vector: &[f32]) -> Result<()> {
        if vector.len() != self.config.dimension {
            anyhow::bail!(
                "Vector dimension mismatch: expected {}, got {}",
                self.config.dimension,
                vector.len()
            );
        }

        if self.id_map.read().contains_key(record_id) {
            // HNSW has no true delete; re-pointing the maps to a fresh
            // internal ID orphans the old node, which is acceptable churn.
            let mut id_map = self.id_map.write();
            let mut reverse = self.reverse_map.write();
            if let Some(old) = id_map.remove(record_id) {
                reverse.remove(&old);
            }
        }

        let vector_id = {
            let mut next = self.next_id.write();
            let id = *next;
            *next += 1;
            id
        };

        {
            let index = self.index.write();
            index.insert((vector, vector_id));
        }

        {
            let mut id_map = self.id_map.write();
            let mut reverse = self.reverse_map.write();
            id_map.insert(record_id.to_string(), vector_id);
            reverse.insert(vector_id, record_id.to_string());
        }

        self.persist_vector(record_id, vector)?;
        Ok(())
    }

    /// Search for similar vectors across the whole namespace.
    pub fn search(&self, query: &[f32], top_k: usize, ef_search: usize) -> Result<Vec<VectorMatch>> {
        if query.len() != self.config.dimension {
            anyhow::bail!(
                "Query dimension mismatch: expected {}, got {}",
                self.config.dimension,
                query.len()
            );
        }

        let index = self.index.read();
        let reverse = self.reverse_map.read();
        let results = index.search(query, top_k, ef_search);
        Ok(results
            .into_iter()
            .filter_map(|item| {
                let record_id = reverse.get(&item.d_id)?;
                Some((record_id.clone(), item.distance))
            })
            .collect())
    }

    /// Search restricted to an allowed ID set (owner/type scoping).
    pub fn search_filtered(
        &self,
        query: &[f32],
        top_k: usize,
        ef_search: usize,
        allowed_ids: &[String],
    ) -> Result<Vec<VectorMatch>> {
        if query.len() != self.config.dimension {
            anyhow::bail!(
                "Query dimension mismatch: expected {}, got {}",
                self.config.dimension,
                query.len()
            );
        }

        let allowed_set: HashSet<&String> = allowed_ids.iter().collect();
        if allowed_set.is_empty() {
            return Ok(Vec::new());
        }

        let index = self.index.read();
        let reverse = self.reverse_map.read();
        // Over-fetch to account for filtering
        let search_k = (top_k * 10).max(top_k);
        let results = index.search(query, search_k, ef_search);

        Ok(results
            .into_iter()
            .filter_map(|item| {
                let record_id = reverse.get(&item.d_id)?;
                if allowed_set.contains(record_id) {
                    Some((record_id.clone(), item.distance))
                } else {
                    None
                }
            })
            .take(top_k)
            .collect())
    }

    /// Check if a record has a vector.
    pub fn has_vector(&self, record_id: &str) -> bool {
        self.id_map.read().contains_key(record_id)
    }

    /// Get vector count.
    pub fn count(&self) -> usize {
        self.id_map.read().len()
    }

    /// Configured dimension for this namespace.
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn storage_key(&self, record_id: &str) -> String {
        format!("{}:{}", self.namespace, record_id)
    }

    fn persist_vector(&self, record_id: &str, vector: &[f32]) -> Result<()> {
        let bytes = bincode::serde::encode_to_vec(vector, bincode::config::standard())?;
        let key = self.storage_key(record_id);
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(VECTOR_TABLE)?;
            table.insert(key.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn rebuild_index(&self) -> Result<()> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(VECTOR_TABLE)?;
        let prefix = format!("{}:", self.namespace);
        let mut vectors: Vec<(String, Vec<f32>)> = Vec::new();
        for item in table.iter()? {
            let (key, value) = item?;
            let Some(record_id) = key.value().strip_prefix(&prefix) else {
                continue;
            };
            let (vector, _): (Vec<f32>, usize) =
                bincode::serde::decode_from_slice(value.value(), bincode::config::standard())?;
            vectors.push((record_id.to_string(), vector));
        }
        drop(read_txn);

        let mut index = self.index.write();
        let mut id_map = self.id_map.write();
        let mut reverse = self.reverse_map.write();
        let mut next_id = self.next_id.write();

        *index = Hnsw::new(
            self.config.max_connections,
            self.config.max_elements,
            16,
            self.config.ef_construction,
            DistCosine,
        );

        id_map.clear();
        reverse.clear();
        *next_id = 0;

        for (record_id, vector) in vectors {
            let vector_id = *next_id;
            *next_id += 1;
            index.insert((vector.as_slice(), vector_id));
            id_map.insert(record_id.clone(), vector_id);
            reverse.insert(vector_id, record_id);
        }

        if !id_map.is_empty() {
            tracing::info!(
                namespace = self.namespace,
                count = id_map.len(),
                "Rebuilt vector index"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_store(dim: usize) -> VectorStore {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::create(db_path).unwrap());
        let config = VectorConfig {
            dimension: dim,
            max_connections: 8,
            ef_construction: 100,
            max_elements: 1000,
        };
        VectorStore::new(db, "chunk", config).unwrap()
    }

    #[test]
    fn test_add_and_search() {
        let store = create_test_store(4);
        store.add("chunk-1", &[1.0, 0.0, 0.0, 0.0]).unwrap();
        store.add("chunk-2", &[0.0, 1.0, 0.0, 0.0]).unwrap();
        store.add("chunk-3", &[0.9, 0.1, 0.0, 0.0]).unwrap();

        let results = store.search(&[1.0, 0.0, 0.0, 0.0], 2, 50).unwrap();
        assert!(!results.is_empty());
        let returned: Vec<&str> = results.iter().map(|item| item.0.as_str()).collect();
        assert!(returned.contains(&"chunk-1"));
    }

    #[test]
    fn test_dimension_validation() {
        let store = create_test_store(4);
        assert!(store.add("chunk-1", &[1.0, 0.0, 0.0]).is_err());
        assert!(store.search(&[1.0, 0.0], 2, 50).is_err());
    }

    #[test]
    fn test_search_filtered() {
        let store = create_test_store(4);
        store.add("chunk-1", &[1.0, 0.0, 0.0, 0.0]).unwrap();
        store.add("chunk-2", &[0.99, 0.01, 0.0, 0.0]).unwrap();
        store.add("chunk-3", &[0.98, 0.02, 0.0, 0.0]).unwrap();

        let allowed = vec!["chunk-2".to_string()];
        let results = store
            .search_filtered(&[1.0, 0.0, 0.0, 0.0], 3, 50, &allowed)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "chunk-2");
    }

    #[test]
    fn test_search_filtered_empty_allowlist() {
        let store = create_test_store(4);
        store.add("chunk-1", &[1.0, 0.0, 0.0, 0.0]).unwrap();
        let results = store
            .search_filtered(&[1.0, 0.0, 0.0, 0.0], 3, 50, &[])
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::create(db_path).unwrap());
        let config = VectorConfig {
            dimension: 4,
            max_connections: 8,
            ef_construction: 100,
            max_elements: 1000,
        };

        let chunks = VectorStore::new(db.clone(), "chunk", config.clone()).unwrap();
        let entities = VectorStore::new(db.clone(), "entity", config.clone()).unwrap();

        chunks.add("rec-1", &[1.0, 0.0, 0.0, 0.0]).unwrap();
        entities.add("rec-1", &[0.0, 1.0, 0.0, 0.0]).unwrap();

        // Reopen: each namespace only reloads its own rows.
        drop(chunks);
        let reopened = VectorStore::new(db, "chunk", config).unwrap();
        assert_eq!(reopened.count(), 1);
        let results = reopened.search(&[1.0, 0.0, 0.0, 0.0], 1, 50).unwrap();
        assert_eq!(results[0].0, "rec-1");
        assert!(results[0].1 < 0.01);
    }

    #[test]
    fn test_count() {
        let store = create_test_store(4);
        assert_eq!(store.count(), 0);
        store.add("chunk-1", &[1.0, 0.0, 0.0, 0.0]).unwrap();
        store.add("chunk-2", &[0.0, 1.0, 0.0, 0.0]).unwrap();
        assert_eq!(store.count(), 2);
        assert!(store.has_vector("chunk-1"));
        assert!(!store.has_vector("chunk-9"));
    }
}
