//! Provider plumbing for the engram memory engine.
//!
//! Contains the LLM client abstraction (with an OpenAI-compatible
//! implementation and a scripted mock), embedding providers with caching and
//! retry, and small text utilities for vector literals and tolerant JSON
//! extraction from model output.

pub mod embedding;
pub mod error;
mod http_client;
pub mod json_extract;
pub mod llm;
pub mod vector_text;

pub use embedding::{Embedder, EmbeddingCache, EmbeddingProvider, MockEmbedding, OpenAiEmbedding};
pub use error::{AiError, Result};
pub use llm::{
    CompletionRequest, CompletionResponse, LlmClient, Message, MockLlm, MockStep, OpenAiClient,
    RetryConfig, Role, TokenUsage,
};
