//! Deterministic embedding provider for tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::provider::EmbeddingProvider;
use crate::error::{AiError, Result};

/// Hash-based embedding provider. Deterministic per input text, so equal
/// texts land on identical vectors and distinct texts usually do not.
pub struct MockEmbedding {
    dimension: usize,
    fail_first: AtomicUsize,
}

impl MockEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail_first: AtomicUsize::new(0),
        }
    }

    /// Fail the next `count` calls with a retryable error before succeeding.
    pub fn failing_first(dimension: usize, count: usize) -> Self {
        Self {
            dimension,
            fail_first: AtomicUsize::new(count),
        }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut seed: u64 = 0xcbf29ce484222325;
        for byte in text.as_bytes() {
            seed ^= u64::from(*byte);
            seed = seed.wrapping_mul(0x100000001b3);
        }
        let mut vector = Vec::with_capacity(self.dimension);
        let mut state = seed;
        for _ in 0..self.dimension {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            vector.push(((state >> 33) as f32 / u32::MAX as f32) - 0.5);
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    fn maybe_fail(&self) -> Result<()> {
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(AiError::LlmHttp {
                provider: "mock".to_string(),
                status: 503,
                message: "scripted failure".to_string(),
                retry_after_secs: None,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.maybe_fail()?;
        Ok(self.vector_for(&self.normalize_text(text)))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.maybe_fail()?;
        Ok(texts
            .iter()
            .map(|t| self.vector_for(&self.normalize_text(t)))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deterministic() {
        let provider = MockEmbedding::new(8);
        let a = provider.embed("hello world").await.unwrap();
        let b = provider.embed("hello   world").await.unwrap();
        let c = provider.embed("goodbye").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 8);
    }

    #[tokio::test]
    async fn test_failing_first() {
        let provider = MockEmbedding::failing_first(4, 1);
        assert!(provider.embed("x").await.is_err());
        assert!(provider.embed("x").await.is_ok());
    }
}
