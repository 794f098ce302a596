use std::time::Duration;

use async_trait::async_trait;
use babysquad_common::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::{LlmClient, LlmRequest, LlmResponse};

/// Error fragments that mark a transient provider failure.
const TRANSIENT_MARKERS: &[&str] = &[
    "429",
    "rate limit",
    "500",
    "502",
    "503",
    "504",
    "529",
    "overloaded",
    "bad gateway",
    "service unavailable",
    "gateway timeout",
    "timed out",
];

/// Backoff policy for [`RetryingClient`].
///
/// `max_retries` defaults to 0: a failed model call surfaces to the turn
/// immediately unless retries are configured explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based), capped at `max_delay_ms`.
    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        // deterministic 0-9% spread so parallel turns do not retry in lockstep
        let spread = (attempt.wrapping_mul(2_654_435_761) % 10) as f64 / 100.0;
        let ms = (base * (1.0 + spread)) as u64;
        Duration::from_millis(ms.min(self.max_delay_ms))
    }
}

/// Wraps a provider and retries transient failures with exponential backoff.
pub struct RetryingClient<T: LlmClient> {
    inner: T,
    config: RetryConfig,
}

impl<T: LlmClient> RetryingClient<T> {
    pub fn new(inner: T, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    fn is_transient(error_msg: &str) -> bool {
        let lower = error_msg.to_lowercase();
        TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker))
    }
}

#[async_trait]
impl<T: LlmClient> LlmClient for RetryingClient<T> {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let mut attempt = 0;

        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    let error_msg = e.to_string();
                    if attempt >= self.config.max_retries || !Self::is_transient(&error_msg) {
                        return Err(e);
                    }

                    let delay = self.config.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error_msg,
                        "Retrying LLM request"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use babysquad_common::SquadError;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with `error` for the first `failures` calls, then succeeds.
    struct FlakyClient {
        failures: u32,
        error: &'static str,
        calls: AtomicU32,
    }

    impl FlakyClient {
        fn new(failures: u32, error: &'static str) -> Self {
            Self {
                failures,
                error,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmClient for FlakyClient {
        async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(SquadError::Llm(self.error.to_string()));
            }
            Ok(LlmResponse {
                content: "ok".to_string(),
                model: "flaky".to_string(),
                usage: None,
                finish_reason: None,
            })
        }
        fn model_name(&self) -> &str {
            "flaky"
        }
    }

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn transient_error_detection() {
        type C = RetryingClient<FlakyClient>;
        assert!(C::is_transient("OpenAI API error 429 Too Many Requests"));
        assert!(C::is_transient("Anthropic API error 529: overloaded"));
        assert!(C::is_transient("503 Service Unavailable"));
        assert!(!C::is_transient("OpenAI API error 401 Unauthorized"));
        assert!(!C::is_transient("No choices in OpenAI response"));
    }

    #[test]
    fn delay_grows_and_is_capped() {
        let config = RetryConfig {
            max_retries: 5,
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            backoff_multiplier: 3.0,
        };
        assert!(config.delay_for(0) >= Duration::from_millis(100));
        assert!(config.delay_for(1) > config.delay_for(0));
        assert_eq!(config.delay_for(6), Duration::from_millis(1_000));
    }

    #[tokio::test]
    async fn default_config_does_not_retry() {
        let client = RetryingClient::new(FlakyClient::new(1, "503 Service Unavailable"), RetryConfig::default());
        assert!(client.complete(LlmRequest::default()).await.is_err());
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let client = RetryingClient::new(FlakyClient::new(2, "502 bad gateway"), fast(3));
        let response = client.complete(LlmRequest::default()).await.unwrap();
        assert_eq!(response.content, "ok");
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let client = RetryingClient::new(FlakyClient::new(5, "401 Unauthorized"), fast(3));
        assert!(client.complete(LlmRequest::default()).await.is_err());
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 1);
    }
}
