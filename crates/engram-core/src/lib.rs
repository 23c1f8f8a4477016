//! Engram Core - conversational memory and retrieval engine
//!
//! The domain layer of the engram workspace: session lifecycle with a
//! bounded buffer, buffer summarization into long-term chunks, persistent
//! entity memory, learned action templates and retrieval-augmented context
//! assembly, all behind the [`MemoryEngine`] facade.
//!
//! Layering follows the workspace split: engram-storage persists bytes and
//! vectors, engram-ai talks to providers, and this crate owns the models
//! and the orchestration between them.

pub mod buffer;
pub mod config;
pub mod engine;
pub mod entity;
pub mod models;
pub mod rag;
pub mod session;
pub mod storage;
pub mod template;

pub use buffer::BufferManager;
pub use config::EngineConfig;
pub use engine::{ActionOutcome, MemoryEngine, TurnContext};
pub use entity::EntityManager;
pub use rag::{RagCoordinator, RetrievedContext};
pub use session::{SessionManager, SUMMARY_EPOCH_DELIMITER};
pub use template::ActionTemplateManager;
