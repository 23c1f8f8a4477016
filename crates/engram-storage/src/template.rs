//! Action template storage - byte-level API for learned action patterns.
//!
//! # Tables
//!
//! - `action_templates`: template_id -> template_data
//! - `template_company_index`: company_id:template_id -> template_id
//! - `template_type_index`: company_id:action_type:template_id -> template_id

use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;

const TEMPLATE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("action_templates");

/// Index: company_id:template_id -> template_id
const COMPANY_INDEX: TableDefinition<&str, &str> = TableDefinition::new("template_company_index");
/// Index: company_id:action_type:template_id -> template_id
const TYPE_INDEX: TableDefinition<&str, &str> = TableDefinition::new("template_type_index");

/// Low-level action template storage with byte-level API.
#[derive(Clone)]
pub struct TemplateStore {
    db: Arc<Database>,
}

impl TemplateStore {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(TEMPLATE_TABLE)?;
        write_txn.open_table(COMPANY_INDEX)?;
        write_txn.open_table(TYPE_INDEX)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Store a raw template with company and type indexes.
    pub fn put_raw(
        &self,
        template_id: &str,
        company_id: &str,
        action_type: &str,
        data: &[u8],
    ) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TEMPLATE_TABLE)?;
            table.insert(template_id, data)?;

            let mut company_index = write_txn.open_table(COMPANY_INDEX)?;
            let company_key = format!("{}:{}", company_id, template_id);
            company_index.insert(company_key.as_str(), template_id)?;

            let mut type_index = write_txn.open_table(TYPE_INDEX)?;
            let type_key = format!("{}:{}:{}", company_id, action_type, template_id);
            type_index.insert(type_key.as_str(), template_id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get raw template data by ID.
    pub fn get_raw(&self, template_id: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TEMPLATE_TABLE)?;

        if let Some(value) = table.get(template_id)? {
            Ok(Some(value.value().to_vec()))
        } else {
            Ok(None)
        }
    }

    /// List template IDs for a company, optionally scoped to one action type.
    pub fn list_ids(&self, company_id: &str, action_type: Option<&str>) -> Result<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let mut ids = Vec::new();

        match action_type {
            Some(action_type) => {
                let index = read_txn.open_table(TYPE_INDEX)?;
                let prefix = format!("{}:{}:", company_id, action_type);
                for item in index.iter()? {
                    let (key, value) = item?;
                    if key.value().starts_with(&prefix) {
                        ids.push(value.value().to_string());
                    }
                }
            }
            None => {
                let index = read_txn.open_table(COMPANY_INDEX)?;
                let prefix = format!("{}:", company_id);
                for item in index.iter()? {
                    let (key, value) = item?;
                    if key.value().starts_with(&prefix) {
                        ids.push(value.value().to_string());
                    }
                }
            }
        }

        Ok(ids)
    }

    /// List all templates for a company.
    pub fn list_by_company_raw(&self, company_id: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(COMPANY_INDEX)?;
        let table = read_txn.open_table(TEMPLATE_TABLE)?;

        let prefix = format!("{}:", company_id);
        let mut templates = Vec::new();

        for item in index.iter()? {
            let (key, value) = item?;
            if key.value().starts_with(&prefix) {
                let template_id = value.value();
                if let Some(data) = table.get(template_id)? {
                    templates.push((template_id.to_string(), data.value().to_vec()));
                }
            }
        }

        Ok(templates)
    }
}
