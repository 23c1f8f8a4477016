//! Engram Storage - Low-level persistence layer
//!
//! This crate provides the persistence layer for the engram memory engine,
//! using redb as the embedded database. It exposes byte-level APIs so the
//! core crate's model types never leak downward.
//!
//! # Architecture
//!
//! Each record family (sessions, memory chunks, entities, action templates)
//! gets its own table plus prefix indexes for scoped listing. Vector search
//! lives in [`VectorStore`], one instance per record family, backed by an
//! in-memory HNSW index rebuilt from redb on open.
//!
//! # Tables
//!
//! - `sessions` - Chat session state
//! - `memory_chunks` (+ company/session/type indexes) - Durable memory
//! - `entities` (+ company index, dedup-key index) - Cross-session entities
//! - `action_templates` (+ company/type indexes) - Learned action patterns
//! - `vectors` (keys `<family>:<id>`) - Persisted embeddings per family

pub mod chunk;
pub mod entity;
pub mod session;
pub mod template;
pub mod time_utils;
pub mod vector;

use anyhow::Result;
use redb::Database;
use std::path::Path;
use std::sync::Arc;

pub use chunk::ChunkStore;
pub use entity::EntityStore;
pub use session::SessionStore;
pub use template::TemplateStore;
pub use vector::{VectorConfig, VectorStore};

/// Central storage manager that initializes all storage subsystems.
pub struct Storage {
    db: Arc<Database>,
    pub sessions: SessionStore,
    pub chunks: ChunkStore,
    pub entities: EntityStore,
    pub templates: TemplateStore,
    pub chunk_vectors: VectorStore,
    pub entity_vectors: VectorStore,
    pub template_vectors: VectorStore,
}

impl Storage {
    /// Create a new storage instance at the given path.
    ///
    /// Creates the database file if it doesn't exist and initializes all
    /// required tables. All three vector indexes share one dimension.
    pub fn new(path: impl AsRef<Path>, vector_config: VectorConfig) -> Result<Self> {
        let db = Arc::new(Database::create(path)?);
        Self::with_db(db, vector_config)
    }

    /// Create a storage instance over an existing database handle.
    pub fn with_db(db: Arc<Database>, vector_config: VectorConfig) -> Result<Self> {
        let sessions = SessionStore::new(db.clone())?;
        let chunks = ChunkStore::new(db.clone())?;
        let entities = EntityStore::new(db.clone())?;
        let templates = TemplateStore::new(db.clone())?;
        let chunk_vectors = VectorStore::new(db.clone(), "chunk", vector_config.clone())?;
        let entity_vectors = VectorStore::new(db.clone(), "entity", vector_config.clone())?;
        let template_vectors = VectorStore::new(db.clone(), "template", vector_config)?;

        Ok(Self {
            db,
            sessions,
            chunks,
            entities,
            templates,
            chunk_vectors,
            entity_vectors,
            template_vectors,
        })
    }

    /// Get a reference to the underlying database.
    pub fn get_db(&self) -> Arc<Database> {
        self.db.clone()
    }
}
