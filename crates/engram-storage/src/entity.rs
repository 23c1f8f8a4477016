//! Entity storage - byte-level API for durable cross-session entities.
//!
//! Entities are deduplicated on a case-insensitive `(company, type, name)`
//! key, held in a dedicated lookup index beside the primary table.
//!
//! # Tables
//!
//! - `entities`: entity_id -> entity_data
//! - `entity_company_index`: company_id:entity_id -> entity_id
//! - `entity_dedup_index`: company_id:entity_type:lowercase(name) -> entity_id

use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;

const ENTITY_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("entities");

/// Index: company_id:entity_id -> entity_id
const COMPANY_INDEX: TableDefinition<&str, &str> = TableDefinition::new("entity_company_index");
/// Index: company_id:entity_type:lowercase(name) -> entity_id
const DEDUP_INDEX: TableDefinition<&str, &str> = TableDefinition::new("entity_dedup_index");

fn dedup_key(company_id: &str, entity_type: &str, entity_name: &str) -> String {
    format!(
        "{}:{}:{}",
        company_id,
        entity_type,
        entity_name.trim().to_lowercase()
    )
}

/// Low-level entity storage with byte-level API.
#[derive(Clone)]
pub struct EntityStore {
    db: Arc<Database>,
}

impl EntityStore {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(ENTITY_TABLE)?;
        write_txn.open_table(COMPANY_INDEX)?;
        write_txn.open_table(DEDUP_INDEX)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Store a raw entity with its dedup and company indexes.
    pub fn put_raw(
        &self,
        entity_id: &str,
        company_id: &str,
        entity_type: &str,
        entity_name: &str,
        data: &[u8],
    ) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ENTITY_TABLE)?;
            table.insert(entity_id, data)?;

            let mut company_index = write_txn.open_table(COMPANY_INDEX)?;
            let company_key = format!("{}:{}", company_id, entity_id);
            company_index.insert(company_key.as_str(), entity_id)?;

            let mut dedup_index = write_txn.open_table(DEDUP_INDEX)?;
            let key = dedup_key(company_id, entity_type, entity_name);
            dedup_index.insert(key.as_str(), entity_id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get raw entity data by ID.
    pub fn get_raw(&self, entity_id: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ENTITY_TABLE)?;

        if let Some(value) = table.get(entity_id)? {
            Ok(Some(value.value().to_vec()))
        } else {
            Ok(None)
        }
    }

    /// Look up an entity ID by its case-insensitive dedup key.
    pub fn find_by_name(
        &self,
        company_id: &str,
        entity_type: &str,
        entity_name: &str,
    ) -> Result<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(DEDUP_INDEX)?;

        let key = dedup_key(company_id, entity_type, entity_name);
        if let Some(value) = index.get(key.as_str())? {
            Ok(Some(value.value().to_string()))
        } else {
            Ok(None)
        }
    }

    /// List all entities for a company.
    pub fn list_by_company_raw(&self, company_id: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(COMPANY_INDEX)?;
        let table = read_txn.open_table(ENTITY_TABLE)?;

        let prefix = format!("{}:", company_id);
        let mut entities = Vec::new();

        for item in index.iter()? {
            let (key, value) = item?;
            if key.value().starts_with(&prefix) {
                let entity_id = value.value();
                if let Some(data) = table.get(entity_id)? {
                    entities.push((entity_id.to_string(), data.value().to_vec()));
                }
            }
        }

        Ok(entities)
    }

    /// List entity IDs for a company.
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_store() -> EntityStore {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::create(db_path).unwrap());
        EntityStore::new(db).unwrap()
    }

    #[test]
    fn test_put_and_get_raw() {
        let store = create_test_store();

        store
            .put_raw("entity-001", "company-a", "client", "Acme", b"data")
            .unwrap();

        assert_eq!(store.get_raw("entity-001").unwrap().unwrap(), b"data");
    }

    #[test]
    fn test_find_by_name_case_insensitive() {
        let store = create_test_store();

        store
            .put_raw("entity-001", "company-a", "client", "Acme", b"data")
            .unwrap();

        assert_eq!(
            store.find_by_name("company-a", "client", "ACME").unwrap(),
            Some("entity-001".to_string())
        );
        assert_eq!(
            store.find_by_name("company-a", "client", "  acme ").unwrap(),
            Some("entity-001".to_string())
        );
        assert!(store
            .find_by_name("company-a", "product", "Acme")
            .unwrap()
            .is_none());
        assert!(store
            .find_by_name("company-b", "client", "Acme")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_list_by_company() {
        let store = create_test_store();

        store
            .put_raw("entity-001", "company-a", "client", "Acme", b"1")
            .unwrap();
        store
            .put_raw("entity-002", "company-a", "product", "Widget", b"2")
            .unwrap();
        store
            .put_raw("entity-003", "company-b", "client", "Globex", b"3")
            .unwrap();

        assert_eq!(store.list_by_company_raw("company-a").unwrap().len(), 2);
        assert_eq!(store.list_by_company_raw("company-b").unwrap().len(), 1);
    }

    #[test]
    fn test_overwrite_keeps_single_row() {
        let store = create_test_store();

        store
            .put_raw("entity-001", "company-a", "client", "Acme", b"v1")
            .unwrap();
        store
            .put_raw("entity-001", "company-a", "client", "Acme", b"v2")
            .unwrap();

        assert_eq!(store.get_raw("entity-001").unwrap().unwrap(), b"v2");
        assert_eq!(store.list_by_company_raw("company-a").unwrap().len(), 1);
    }
}
