//! Typed storage wrappers.
//!
//! Type-safe access to the byte-level stores in engram-storage: records are
//! serialized as JSON bytes, embeddings go through the per-family vector
//! stores, and similarity search combines owner-scoped index lookups with
//! filtered ANN search.

mod chunk;
mod entity;
mod session;
mod template;

pub use chunk::ChunkStorage;
pub use entity::EntityStorage;
pub use session::SessionStorage;
pub use template::TemplateStorage;

/// Search width for ANN queries. Wide enough for the over-fetch that
/// owner filtering requires.
pub(crate) const EF_SEARCH: usize = 100;

/// Convert a cosine distance into a similarity score in [0, 1].
pub(crate) fn distance_to_similarity(distance: f32) -> f32 {
    (1.0 - distance).clamp(0.0, 1.0)
}
