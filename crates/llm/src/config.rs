use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use babysquad_common::{Result, SquadError};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::info;

use crate::anthropic::AnthropicClient;
use crate::client::{LlmClient, LlmRequest, LlmResponse};
use crate::openai::OpenAiClient;
use crate::retry::{RetryConfig, RetryingClient};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai" (any OpenAI-compatible endpoint) or "anthropic"
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Falls back to OPENAI_API_KEY / ANTHROPIC_API_KEY when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    /// Per-request timeout; the orchestrator itself never times out a turn
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_provider() -> String {
    "openai".into()
}

fn default_model() -> String {
    "gpt-4o".into()
}

fn default_temperature() -> Option<f32> {
    Some(0.0)
}

fn default_max_concurrent() -> usize {
    4
}

fn default_timeout_ms() -> u64 {
    60_000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            api_url: None,
            temperature: default_temperature(),
            max_tokens: None,
            max_concurrent_requests: default_max_concurrent(),
            timeout_ms: default_timeout_ms(),
            retry: RetryConfig::default(),
        }
    }
}

impl LlmConfig {
    /// A non-empty `api_key` wins; otherwise the provider's environment
    /// variable is consulted.
    pub fn resolve_api_key(&self) -> Option<String> {
        let env_var = match self.provider.as_str() {
            "openai" => Some("OPENAI_API_KEY"),
            "anthropic" => Some("ANTHROPIC_API_KEY"),
            _ => None,
        };
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| env_var.and_then(|var| std::env::var(var).ok()))
            .filter(|key| !key.is_empty())
    }
}

/// Caps how many requests are in flight against the wrapped client at once.
/// Turns for different sessions share one provider quota through it.
pub struct SemaphoredClient {
    inner: Arc<dyn LlmClient>,
    permits: Semaphore,
}

impl SemaphoredClient {
    pub fn new(inner: Arc<dyn LlmClient>, max_concurrent: usize) -> Self {
        Self {
            inner,
            permits: Semaphore::new(max_concurrent.max(1)),
        }
    }
}

#[async_trait]
impl LlmClient for SemaphoredClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| SquadError::Llm("request limiter closed".into()))?;
        self.inner.complete(request).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

fn http_client(timeout_ms: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .map_err(|e| SquadError::Config(format!("Failed to build HTTP client: {e}")))
}

pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let http = http_client(config.timeout_ms)?;

    let base_client: Box<dyn LlmClient> = match config.provider.as_str() {
        "openai" => Box::new(
            OpenAiClient::new(
                config.api_url.clone(),
                config.model.clone(),
                config.resolve_api_key(),
            )
            .with_http_client(http),
        ),
        "anthropic" => {
            let api_key = config.resolve_api_key().ok_or_else(|| {
                SquadError::Config("Anthropic requires an API key".to_string())
            })?;
            let mut client = AnthropicClient::new(config.model.clone(), api_key).with_http_client(http);
            if let Some(ref url) = config.api_url {
                client = client.with_base_url(url.clone());
            }
            Box::new(client)
        }
        other => {
            return Err(SquadError::Config(format!("Unknown LLM provider: {other}")));
        }
    };

    info!(
        provider = %config.provider,
        model = %config.model,
        max_retries = config.retry.max_retries,
        timeout_ms = config.timeout_ms,
        "Language model client configured"
    );

    let inner: Arc<dyn LlmClient> = if config.retry.max_retries > 0 {
        Arc::new(RetryingClient::new(base_client, config.retry.clone()))
    } else {
        Arc::from(base_client)
    };

    Ok(Arc::new(SemaphoredClient::new(
        inner,
        config.max_concurrent_requests,
    )))
}
