//! Engine configuration.
//!
//! Tunables deserialize with defaults so a partial config file works;
//! credentials come from the environment and missing ones fail fast at
//! construction instead of surfacing as provider errors mid-turn.

use serde::Deserialize;

use engram_ai::AiError;

const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Messages kept verbatim in the context window
    pub buffer_size: usize,

    /// Buffer length that triggers summarization of the older prefix
    pub max_buffer_messages: usize,

    /// Bound on the in-process session cache
    pub cache_capacity: usize,

    /// Minimum similarity for retrieval hits. Empirically tuned.
    pub retrieval_threshold: f32,

    /// Similarity at which a new action template is treated as a duplicate
    /// of an existing one. Empirically tuned.
    pub template_dedup_threshold: f32,

    /// Maximum hits per retrieval arm
    pub retrieval_limit: usize,

    /// Retry budget for best-effort embedding calls
    pub embed_retries: u32,

    /// Chat completion model
    pub chat_model: String,

    /// Embedding model
    pub embedding_model: String,

    /// Embedding dimension, fixed per deployment
    pub embedding_dimension: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_size: 10,
            max_buffer_messages: 20,
            cache_capacity: 500,
            retrieval_threshold: 0.5,
            template_dedup_threshold: 0.9,
            retrieval_limit: 5,
            embed_retries: 2,
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimension: 1536,
        }
    }
}

/// Read the OpenAI API key from the environment.
pub fn openai_api_key() -> Result<String, AiError> {
    std::env::var(OPENAI_API_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| AiError::MissingCredential(OPENAI_API_KEY_ENV.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.buffer_size, 10);
        assert_eq!(config.max_buffer_messages, 20);
        assert_eq!(config.retrieval_threshold, 0.5);
        assert_eq!(config.template_dedup_threshold, 0.9);
    }

    #[test]
    fn test_partial_config_deserializes() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"buffer_size": 4, "retrieval_threshold": 0.7}"#).unwrap();
        assert_eq!(config.buffer_size, 4);
        assert_eq!(config.retrieval_threshold, 0.7);
        assert_eq!(config.max_buffer_messages, 20);
    }
}
