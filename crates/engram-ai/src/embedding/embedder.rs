//! High-level embedding entry point with caching, truncation and retry.

use std::sync::Arc;

use super::cache::EmbeddingCache;
use super::provider::EmbeddingProvider;
use crate::error::{AiError, Result};
use crate::llm::retry::RetryConfig;

/// Inputs longer than this are truncated at a char boundary before the
/// provider call; embedding quality degrades gracefully past this point
/// anyway and providers reject oversized input outright.
const MAX_EMBED_CHARS: usize = 8_000;

/// Embedding facade used by the memory managers. Wraps a provider with a
/// content-addressed cache and a retrying, never-failing variant for
/// best-effort call sites.
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
    retry_config: RetryConfig,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            cache: EmbeddingCache::new(1_000),
            retry_config: RetryConfig::default(),
        }
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    fn prepare(&self, text: &str) -> Result<String> {
        let normalized = self.provider.normalize_text(text);
        if normalized.is_empty() {
            return Err(AiError::EmptyInput(
                "Cannot embed empty or whitespace-only text".to_string(),
            ));
        }
        if normalized.chars().count() > MAX_EMBED_CHARS {
            Ok(normalized.chars().take(MAX_EMBED_CHARS).collect())
        } else {
            Ok(normalized)
        }
    }

    /// Embed one text. Blank input is a contract error; provider failures
    /// propagate to the caller.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let prepared = self.prepare(text)?;
        if let Some(cached) = self.cache.get(&prepared, self.provider.model_name()) {
            return Ok(cached);
        }

        let embedding = self.provider.embed(&prepared).await?;
        self.cache
            .put(&prepared, self.provider.model_name(), embedding.clone());
        Ok(embedding)
    }

    /// Embed a batch, skipping blank entries. The result holds one vector
    /// per non-blank input, in original order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let prepared: Vec<String> = texts
            .iter()
            .filter_map(|t| self.prepare(t).ok())
            .collect();
        if prepared.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.provider.embed_batch(&prepared).await?;
        for (text, embedding) in prepared.iter().zip(embeddings.iter()) {
            self.cache
                .put(text, self.provider.model_name(), embedding.clone());
        }
        Ok(embeddings)
    }

    /// Best-effort embed with exponential backoff. Returns `None` once the
    /// retry budget is exhausted or on a non-retryable error; never fails.
    pub async fn embed_with_retry(&self, text: &str, max_retries: u32) -> Option<Vec<f32>> {
        for attempt in 0..=max_retries {
            match self.embed(text).await {
                Ok(embedding) => return Some(embedding),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    let retry_after = match &e {
                        AiError::LlmHttp {
                            retry_after_secs, ..
                        } => *retry_after_secs,
                        _ => None,
                    };
                    let delay = self.retry_config.delay_for(attempt + 1, retry_after);
                    tracing::warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Embedding failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Embedding failed, giving up");
                    return None;
                }
            }
        }
        None
    }
}
