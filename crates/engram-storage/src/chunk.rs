//! Memory chunk storage - byte-level API for durable memory persistence.
//!
//! Chunks are append-only records indexed by company, session and chunk
//! type so retrieval can scope a vector search to an owner before ranking.
//!
//! # Tables
//!
//! - `memory_chunks`: chunk_id -> chunk_data
//! - `chunk_company_index`: company_id:chunk_id -> chunk_id
//! - `chunk_session_index`: session_id:chunk_id -> chunk_id
//! - `chunk_type_index`: company_id:chunk_type:chunk_id -> chunk_id

use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;

const CHUNK_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("memory_chunks");

/// Index: company_id:chunk_id -> chunk_id
const COMPANY_INDEX: TableDefinition<&str, &str> = TableDefinition::new("chunk_company_index");
/// Index: session_id:chunk_id -> chunk_id
const SESSION_INDEX: TableDefinition<&str, &str> = TableDefinition::new("chunk_session_index");
/// Index: company_id:chunk_type:chunk_id -> chunk_id
const TYPE_INDEX: TableDefinition<&str, &str> = TableDefinition::new("chunk_type_index");

/// Low-level memory chunk storage with byte-level API.
#[derive(Clone)]
pub struct ChunkStore {
    db: Arc<Database>,
}

impl ChunkStore {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(CHUNK_TABLE)?;
        write_txn.open_table(COMPANY_INDEX)?;
        write_txn.open_table(SESSION_INDEX)?;
        write_txn.open_table(TYPE_INDEX)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Store a raw memory chunk with all indexes.
    ///
    /// Also used to overwrite an existing chunk's bytes in place (access
    /// metadata updates); index entries are idempotent re-inserts.
    pub fn put_raw(
        &self,
        chunk_id: &str,
        company_id: &str,
        session_id: &str,
        chunk_type: &str,
        data: &[u8],
    ) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CHUNK_TABLE)?;
            table.insert(chunk_id, data)?;

            let mut company_index = write_txn.open_table(COMPANY_INDEX)?;
            let company_key = format!("{}:{}", company_id, chunk_id);
            company_index.insert(company_key.as_str(), chunk_id)?;

            let mut session_index = write_txn.open_table(SESSION_INDEX)?;
            let session_key = format!("{}:{}", session_id, chunk_id);
            session_index.insert(session_key.as_str(), chunk_id)?;

            let mut type_index = write_txn.open_table(TYPE_INDEX)?;
            let type_key = format!("{}:{}:{}", company_id, chunk_type, chunk_id);
            type_index.insert(type_key.as_str(), chunk_id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get raw chunk data by ID.
    pub fn get_raw(&self, chunk_id: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CHUNK_TABLE)?;

        if let Some(value) = table.get(chunk_id)? {
            Ok(Some(value.value().to_vec()))
        } else {
            Ok(None)
        }
    }

    /// List chunk IDs for a company.
    pub fn list_ids_by_company(&self, company_id: &str) -> Result<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(COMPANY_INDEX)?;

        let prefix = format!("{}:", company_id);
        let mut ids = Vec::new();

        for item in index.iter()? {
            let (key, value) = item?;
            if key.value().starts_with(&prefix) {
                ids.push(value.value().to_string());
            }
        }

        Ok(ids)
    }

    /// List chunk IDs for a company restricted to one chunk type.
    pub fn list_ids_by_type(&self, company_id: &str, chunk_type: &str) -> Result<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(TYPE_INDEX)?;

        let prefix = format!("{}:{}:", company_id, chunk_type);
        let mut ids = Vec::new();

        for item in index.iter()? {
            let (key, value) = item?;
            if key.value().starts_with(&prefix) {
                ids.push(value.value().to_string());
            }
        }

        Ok(ids)
    }

    /// List all chunks for a session.
    pub fn list_by_session_raw(&self, session_id: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(SESSION_INDEX)?;
        let table = read_txn.open_table(CHUNK_TABLE)?;

        let prefix = format!("{}:", session_id);
        let mut chunks = Vec::new();

        for item in index.iter()? {
            let (key, value) = item?;
            if key.value().starts_with(&prefix) {
                let chunk_id = value.value();
                if let Some(data) = table.get(chunk_id)? {
                    chunks.push((chunk_id.to_string(), data.value().to_vec()));
                }
            }
        }

        Ok(chunks)
    }

    /// Count chunks for a company.
    pub fn count_by_company(&self, company_id: &str) -> Result<u32> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(COMPANY_INDEX)?;

        let prefix = format!("{}:", company_id);
        let mut count = 0u32;

        for item in index.iter()? {
            let (key, _) = item?;
            if key.value().starts_with(&prefix) {
                count += 1;
            }
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_store() -> ChunkStore {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::create(db_path).unwrap());
        ChunkStore::new(db).unwrap()
    }

    #[test]
    fn test_put_and_get_raw() {
        let store = create_test_store();

        let data = b"chunk data";
        store
            .put_raw("chunk-001", "company-a", "session-001", "conversation", data)
            .unwrap();

        let retrieved = store.get_raw("chunk-001").unwrap();
        assert_eq!(retrieved.unwrap(), data);
    }

    #[test]
    fn test_list_ids_by_company() {
        let store = create_test_store();

        store
            .put_raw("chunk-001", "company-a", "s1", "conversation", b"1")
            .unwrap();
        store
            .put_raw("chunk-002", "company-a", "s1", "summary", b"2")
            .unwrap();
        store
            .put_raw("chunk-003", "company-b", "s2", "conversation", b"3")
            .unwrap();

        assert_eq!(store.list_ids_by_company("company-a").unwrap().len(), 2);
        assert_eq!(store.list_ids_by_company("company-b").unwrap().len(), 1);
        assert!(store.list_ids_by_company("company-c").unwrap().is_empty());
    }

    #[test]
    fn test_list_ids_by_type() {
        let store = create_test_store();

        store
            .put_raw("chunk-001", "company-a", "s1", "conversation", b"1")
            .unwrap();
        store
            .put_raw("chunk-002", "company-a", "s1", "summary", b"2")
            .unwrap();
        store
            .put_raw("chunk-003", "company-a", "s1", "action_success", b"3")
            .unwrap();

        let summaries = store.list_ids_by_type("company-a", "summary").unwrap();
        assert_eq!(summaries, vec!["chunk-002".to_string()]);
    }

    #[test]
    fn test_list_by_session() {
        let store = create_test_store();

        store
            .put_raw("chunk-001", "company-a", "session-1", "conversation", b"1")
            .unwrap();
        store
            .put_raw("chunk-002", "company-a", "session-1", "conversation", b"2")
            .unwrap();
        store
            .put_raw("chunk-003", "company-a", "session-2", "conversation", b"3")
            .unwrap();

        assert_eq!(store.list_by_session_raw("session-1").unwrap().len(), 2);
        assert_eq!(store.list_by_session_raw("session-2").unwrap().len(), 1);
    }

    #[test]
    fn test_overwrite_preserves_single_index_entry() {
        let store = create_test_store();

        store
            .put_raw("chunk-001", "company-a", "s1", "conversation", b"v1")
            .unwrap();
        store
            .put_raw("chunk-001", "company-a", "s1", "conversation", b"v2")
            .unwrap();

        assert_eq!(store.get_raw("chunk-001").unwrap().unwrap(), b"v2");
        assert_eq!(store.count_by_company("company-a").unwrap(), 1);
    }
}
