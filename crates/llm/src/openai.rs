//! OpenAI-compatible chat completions.

use async_trait::async_trait;
use babysquad_common::{Result, SquadError};
use serde::{Deserialize, Serialize};

use crate::client::{LlmClient, LlmRequest, LlmResponse, Role, TokenUsage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletion {
    model: String,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl ChatCompletion {
    fn into_response(self) -> Result<LlmResponse> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| SquadError::Llm("No choices in OpenAI response".into()))?;
        let content = choice
            .message
            .content
            .ok_or_else(|| SquadError::Llm("OpenAI choice carries no content".into()))?;
        Ok(LlmResponse {
            content,
            model: self.model,
            usage: self.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
            finish_reason: choice.finish_reason,
        })
    }
}

/// Any endpoint speaking the OpenAI chat completions protocol: OpenAI,
/// Ollama, vLLM or a LiteLLM proxy.
pub struct OpenAiClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(base_url: Option<String>, model: String, api_key: Option<String>) -> Self {
        let base_url = base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            model,
            api_key,
            http: reqwest::Client::new(),
        }
    }

    /// Swap in a client carrying the configured request timeout.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// The system prompt becomes a leading `system` message.
    fn body<'a>(&'a self, request: &'a LlmRequest) -> ChatCompletionBody<'a> {
        let system = request.system_prompt.as_deref().map(|content| WireMessage {
            role: Role::System,
            content,
        });
        let turns = request.messages.iter().map(|m| WireMessage {
            role: m.role,
            content: &m.content,
        });
        ChatCompletionBody {
            model: &self.model,
            messages: system.into_iter().chain(turns).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let mut call = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&self.body(&request));
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let response = call
            .send()
            .await
            .map_err(|e| SquadError::Llm(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SquadError::Llm(format!("OpenAI API error {status}: {detail}")));
        }

        response
            .json::<ChatCompletion>()
            .await
            .map_err(|e| SquadError::Llm(format!("Unreadable OpenAI response: {e}")))?
            .into_response()
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
