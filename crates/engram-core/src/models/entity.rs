//! Persistent entity memory: clients, products and suppliers the business
//! talks about, deduplicated case-insensitively per tenant.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use engram_storage::time_utils;

/// Category of a tracked entity. Serialized as a plain string so unknown
/// categories survive round-trips.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum EntityType {
    Client,
    Product,
    Supplier,
    Other(String),
}

impl EntityType {
    pub fn as_str(&self) -> &str {
        match self {
            EntityType::Client => "client",
            EntityType::Product => "product",
            EntityType::Supplier => "supplier",
            EntityType::Other(s) => s,
        }
    }
}

impl From<String> for EntityType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "client" => EntityType::Client,
            "product" => EntityType::Product,
            "supplier" => EntityType::Supplier,
            _ => EntityType::Other(s),
        }
    }
}

impl From<EntityType> for String {
    fn from(t: EntityType) -> Self {
        t.as_str().to_string()
    }
}

/// Typed attributes with a flattened escape hatch for anything else the
/// extractor produces.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EntityAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl EntityAttributes {
    pub fn is_empty(&self) -> bool {
        self.company.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.notes.is_none()
            && self.extra.is_empty()
    }

    /// Fill in fields that are absent here but present in `other`.
    /// Existing values are never overwritten.
    pub fn merge_missing(&mut self, other: &EntityAttributes) {
        if self.company.is_none() {
            self.company = other.company.clone();
        }
        if self.email.is_none() {
            self.email = other.email.clone();
        }
        if self.phone.is_none() {
            self.phone = other.phone.clone();
        }
        if self.notes.is_none() {
            self.notes = other.notes.clone();
        }
        for (key, value) in &other.extra {
            self.extra.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    /// Compact single-line rendering for embedding and prompts.
    pub fn summary_text(&self) -> String {
        let mut parts = Vec::new();
        if let Some(company) = &self.company {
            parts.push(format!("company: {company}"));
        }
        if let Some(email) = &self.email {
            parts.push(format!("email: {email}"));
        }
        if let Some(phone) = &self.phone {
            parts.push(format!("phone: {phone}"));
        }
        if let Some(notes) = &self.notes {
            parts.push(format!("notes: {notes}"));
        }
        for (key, value) in &self.extra {
            match value {
                Value::String(s) => parts.push(format!("{key}: {s}")),
                other => parts.push(format!("{key}: {other}")),
            }
        }
        parts.join(", ")
    }
}

/// A persisted entity with interaction bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackedEntity {
    /// Unique identifier for this entity
    pub id: String,

    /// Company (tenant) scope
    pub company_id: String,

    /// User the entity record belongs to
    pub user_id: String,

    pub entity_type: EntityType,

    /// Display name as first seen. Dedup compares the lowercased,
    /// trimmed form.
    pub entity_name: String,

    #[serde(default)]
    pub attributes: EntityAttributes,

    /// Vector embedding for semantic search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_dim: Option<usize>,

    /// How many conversations mentioned this entity (monotonic)
    #[serde(default)]
    pub interaction_count: u32,

    /// Unix timestamp in milliseconds of the last mention
    pub last_interaction: i64,

    /// Unix timestamp in milliseconds when this record was created
    pub created_at: i64,
}

impl TrackedEntity {
    pub fn new(
        company_id: impl Into<String>,
        user_id: impl Into<String>,
        entity_type: EntityType,
        entity_name: impl Into<String>,
    ) -> Self {
        let now = time_utils::now_ms();
        Self {
            id: format!("entity-{}", uuid::Uuid::new_v4()),
            company_id: company_id.into(),
            user_id: user_id.into(),
            entity_type,
            entity_name: entity_name.into(),
            attributes: EntityAttributes::default(),
            embedding: None,
            embedding_model: None,
            embedding_dim: None,
            interaction_count: 1,
            last_interaction: now,
            created_at: now,
        }
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: EntityAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>, model: String) -> Self {
        self.embedding_dim = Some(embedding.len());
        self.embedding = Some(embedding);
        self.embedding_model = Some(model);
        self
    }

    /// Canonical text embedded for this entity.
    pub fn embedding_text(&self) -> String {
        let attributes = self.attributes.summary_text();
        if attributes.is_empty() {
            format!("{}: {}", self.entity_type.as_str(), self.entity_name)
        } else {
            format!(
                "{}: {} ({})",
                self.entity_type.as_str(),
                self.entity_name,
                attributes
            )
        }
    }

    /// Record another conversation touching this entity.
    pub fn record_interaction(&mut self) {
        self.interaction_count = self.interaction_count.saturating_add(1);
        self.last_interaction = time_utils::now_ms();
    }
}

/// Entities pulled from one user message by the extraction prompt.
/// Extraction failures collapse to the all-empty default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractedEntities {
    #[serde(default)]
    pub clients: Vec<String>,
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
    #[serde(default)]
    pub intent: Option<String>,
}

impl ExtractedEntities {
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
            && self.products.is_empty()
            && self.preferences.is_empty()
            && self.intent.is_none()
    }
}
