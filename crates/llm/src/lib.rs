//! Language model clients for BabySquad.
//!
//! Every provider implements [`LlmClient`]. [`build_llm_client`] assembles the
//! configured provider behind an optional retry layer and a concurrency
//! limiter; callers only ever see `Arc<dyn LlmClient>`.

pub mod anthropic;
pub mod client;
pub mod config;
pub mod openai;
pub mod retry;

pub use anthropic::AnthropicClient;
pub use client::{
    ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenUsage, complete_with_history,
};
pub use config::{LlmConfig, SemaphoredClient, build_llm_client};
pub use openai::OpenAiClient;
pub use retry::{RetryConfig, RetryingClient};
