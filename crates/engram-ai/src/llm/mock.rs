//! Deterministic mock LLM client for tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

use crate::error::{AiError, Result};

use super::{CompletionRequest, CompletionResponse, LlmClient};

/// Scripted completion step with optional delay.
#[derive(Debug, Clone)]
pub struct MockStep {
    pub delay_ms: u64,
    pub kind: MockStepKind,
}

/// Deterministic step for scripted mock completions.
#[derive(Debug, Clone)]
pub enum MockStepKind {
    /// Return a plain assistant message.
    Text(String),
    /// Return an HTTP-style error with the given status.
    HttpError(u16),
}

impl MockStep {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Text(content.into()),
        }
    }

    pub fn http_error(status: u16) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::HttpError(status),
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// Scripted LLM client. Steps are consumed in order; once the script runs
/// out, every further call repeats the fallback text.
pub struct MockLlm {
    steps: Arc<Mutex<VecDeque<MockStep>>>,
    fallback: String,
}

impl MockLlm {
    pub fn new(steps: Vec<MockStep>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into())),
            fallback: "mock response".to_string(),
        }
    }

    pub fn always(content: impl Into<String>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(VecDeque::new())),
            fallback: content.into(),
        }
    }

    pub fn with_fallback(mut self, content: impl Into<String>) -> Self {
        self.fallback = content.into();
        self
    }

    pub async fn remaining_steps(&self) -> usize {
        self.steps.lock().await.len()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
        let step = self.steps.lock().await.pop_front();
        let Some(step) = step else {
            return Ok(CompletionResponse {
                content: self.fallback.clone(),
                usage: None,
            });
        };

        if step.delay_ms > 0 {
            sleep(Duration::from_millis(step.delay_ms)).await;
        }

        match step.kind {
            MockStepKind::Text(content) => Ok(CompletionResponse {
                content,
                usage: None,
            }),
            MockStepKind::HttpError(status) => Err(AiError::LlmHttp {
                provider: "mock".to_string(),
                status,
                message: "scripted failure".to_string(),
                retry_after_secs: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_steps_then_fallback() {
        let llm = MockLlm::new(vec![MockStep::text("first"), MockStep::http_error(503)])
            .with_fallback("done");

        let first = llm.complete(CompletionRequest::default()).await.unwrap();
        assert_eq!(first.content, "first");

        let second = llm.complete(CompletionRequest::default()).await;
        assert!(second.is_err());
        assert!(second.err().is_some_and(|e| e.is_retryable()));

        let third = llm.complete(CompletionRequest::default()).await.unwrap();
        assert_eq!(third.content, "done");
    }
}
