//! Domain models for the memory engine.

pub mod chunk;
pub mod entity;
pub mod session;
pub mod template;

pub use chunk::{ChunkMetadata, ChunkType, MemoryChunk};
pub use entity::{EntityAttributes, EntityType, ExtractedEntities, TrackedEntity};
pub use session::{ActiveEntities, ActiveEntity, ChatMessage, MessageRole, Session};
pub use template::{ActionData, ActionTemplate, ActionType, LineItem};
