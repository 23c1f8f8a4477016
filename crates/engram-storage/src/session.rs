//! Session storage - byte-level API for chat session persistence.

use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;

const SESSION_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

/// Index: company_id:session_id -> session_id (for listing by owner)
const COMPANY_SESSION_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("session_company_index");

/// Low-level session storage with byte-level API.
#[derive(Debug, Clone)]
pub struct SessionStore {
    db: Arc<Database>,
}

impl SessionStore {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(SESSION_TABLE)?;
        write_txn.open_table(COMPANY_SESSION_INDEX)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Store raw session data, indexed by company.
    pub fn put_raw(&self, session_id: &str, company_id: &str, data: &[u8]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSION_TABLE)?;
            table.insert(session_id, data)?;

            let mut index = write_txn.open_table(COMPANY_SESSION_INDEX)?;
            let key = format!("{}:{}", company_id, session_id);
            index.insert(key.as_str(), session_id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get raw session data by ID.
    pub fn get_raw(&self, session_id: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSION_TABLE)?;

        if let Some(data) = table.get(session_id)? {
            Ok(Some(data.value().to_vec()))
        } else {
            Ok(None)
        }
    }

    /// List raw session data for a company.
    pub fn list_by_company_raw(&self, company_id: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(COMPANY_SESSION_INDEX)?;
        let table = read_txn.open_table(SESSION_TABLE)?;

        let prefix = format!("{}:", company_id);
        let mut sessions = Vec::new();

        for item in index.iter()? {
            let (key, value) = item?;
            if key.value().starts_with(&prefix) {
                let session_id = value.value();
                if let Some(data) = table.get(session_id)? {
                    sessions.push((session_id.to_string(), data.value().to_vec()));
                }
            }
        }

        Ok(sessions)
    }

    /// Check if a session exists.
    pub fn exists(&self, session_id: &str) -> Result<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSION_TABLE)?;
        Ok(table.get(session_id)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_store() -> SessionStore {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::create(db_path).unwrap());
        SessionStore::new(db).unwrap()
    }

    #[test]
    fn test_put_and_get_raw() {
        let store = create_test_store();

        let data = b"session data";
        store.put_raw("session-001", "company-a", data).unwrap();

        let retrieved = store.get_raw("session-001").unwrap();
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap(), data);
    }

    #[test]
    fn test_get_nonexistent() {
        let store = create_test_store();
        assert!(store.get_raw("missing").unwrap().is_none());
    }

    #[test]
    fn test_list_by_company() {
        let store = create_test_store();

        store.put_raw("session-001", "company-a", b"a1").unwrap();
        store.put_raw("session-002", "company-a", b"a2").unwrap();
        store.put_raw("session-003", "company-b", b"b1").unwrap();

        assert_eq!(store.list_by_company_raw("company-a").unwrap().len(), 2);
        assert_eq!(store.list_by_company_raw("company-b").unwrap().len(), 1);
        assert!(store.list_by_company_raw("company-c").unwrap().is_empty());
    }

    #[test]
    fn test_exists_and_update() {
        let store = create_test_store();

        assert!(!store.exists("session-001").unwrap());
        store.put_raw("session-001", "company-a", b"v1").unwrap();
        assert!(store.exists("session-001").unwrap());

        store.put_raw("session-001", "company-a", b"v2").unwrap();
        assert_eq!(store.get_raw("session-001").unwrap().unwrap(), b"v2");
    }
}
