//! Error types for provider plumbing

use thiserror::Error;

/// AI module error types
#[derive(Error, Debug)]
pub enum AiError {
    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    #[error("{provider} returned HTTP {status}: {message}")]
    LlmHttp {
        provider: String,
        status: u16,
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AiError {
    /// Whether a retry with backoff has any chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::LlmHttp { status, .. } => {
                *status == 429 || *status == 408 || (500..=599).contains(status)
            }
            AiError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Result type alias for AI operations
pub type Result<T> = std::result::Result<T, AiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let make = |status| AiError::LlmHttp {
            provider: "openai".to_string(),
            status,
            message: String::new(),
            retry_after_secs: None,
        };
        assert!(make(429).is_retryable());
        assert!(make(503).is_retryable());
        assert!(!make(401).is_retryable());
        assert!(!make(404).is_retryable());
    }

    #[test]
    fn test_contract_errors_not_retryable() {
        assert!(!AiError::EmptyInput("text".to_string()).is_retryable());
        assert!(!AiError::DimensionMismatch {
            expected: 1536,
            actual: 3
        }
        .is_retryable());
    }
}
