//! LLM clients: trait, OpenAI-compatible implementation, scripted mock.

pub mod client;
pub mod mock;
pub mod openai;
pub mod retry;

pub use client::{CompletionRequest, CompletionResponse, LlmClient, Message, Role, TokenUsage};
pub use mock::{MockLlm, MockStep};
pub use openai::OpenAiClient;
pub use retry::RetryConfig;
