//! Embedding providers and utilities.

mod cache;
mod embedder;
mod mock;
mod openai;
mod provider;

pub use cache::EmbeddingCache;
pub use embedder::Embedder;
pub use mock::MockEmbedding;
pub use openai::OpenAiEmbedding;
pub use provider::{EmbeddingConfig, EmbeddingProvider};
