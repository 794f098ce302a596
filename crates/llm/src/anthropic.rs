//! Anthropic messages API.

use async_trait::async_trait;
use babysquad_common::{Result, SquadError};
use serde::{Deserialize, Serialize};

use crate::client::{LlmClient, LlmRequest, LlmResponse, Role, TokenUsage};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 2048;

#[derive(Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    messages: Vec<Turn<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Turn<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesReply {
    model: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
    stop_reason: Option<String>,
}

/// Only `text` blocks carry answer text.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl MessagesReply {
    fn into_response(self) -> Result<LlmResponse> {
        let content: String = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();
        if content.is_empty() {
            return Err(SquadError::Llm("Anthropic reply has no text block".into()));
        }
        Ok(LlmResponse {
            content,
            model: self.model,
            usage: self.usage.map(|u| TokenUsage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
            }),
            finish_reason: self.stop_reason,
        })
    }
}

pub struct AnthropicClient {
    base_url: String,
    model: String,
    api_key: String,
    http: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(model: String, api_key: String) -> Self {
        Self {
            base_url: ANTHROPIC_API_URL.to_owned(),
            model,
            api_key,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// System instruction is a top-level field here; system-role turns in the
    /// history are appended to it.
    fn body<'a>(&'a self, request: &'a LlmRequest) -> MessagesBody<'a> {
        let (system_turns, turns): (Vec<_>, Vec<_>) =
            request.messages.iter().partition(|m| m.role == Role::System);

        let system: Vec<&str> = request
            .system_prompt
            .as_deref()
            .into_iter()
            .chain(system_turns.iter().map(|m| m.content.as_str()))
            .collect();

        MessagesBody {
            model: &self.model,
            messages: turns
                .into_iter()
                .map(|m| Turn {
                    role: m.role,
                    content: &m.content,
                })
                .collect(),
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            temperature: request.temperature,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.body(&request))
            .send()
            .await
            .map_err(|e| SquadError::Llm(format!("Anthropic request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SquadError::Llm(format!("Anthropic API error {status}: {detail}")));
        }

        response
            .json::<MessagesReply>()
            .await
            .map_err(|e| SquadError::Llm(format!("Unreadable Anthropic response: {e}")))?
            .into_response()
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChatMessage;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> AnthropicClient {
        AnthropicClient::new("claude-sonnet-4-20250514".to_string(), "sk-ant-test".to_string())
    }

    #[test]
    fn system_turns_are_folded_into_top_level_system() {
        let request = LlmRequest {
            system_prompt: Some("Persona".to_string()),
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: "Extra rule".to_string(),
                },
                ChatMessage {
                    role: Role::User,
                    content: "Hello".to_string(),
                },
                ChatMessage {
                    role: Role::Assistant,
                    content: "Hi there!".to_string(),
                },
            ],
            temperature: Some(0.0),
            max_tokens: None,
        };

        let json = serde_json::to_value(client().body(&request)).unwrap();
        assert_eq!(json["system"], "Persona\n\nExtra rule");
        assert_eq!(json["max_tokens"], DEFAULT_MAX_TOKENS);

        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");
    }

    #[test]
    fn system_is_omitted_when_absent() {
        let request = LlmRequest {
            messages: vec![ChatMessage {
                role: Role::User,
                content: "Hello".to_string(),
            }],
            ..Default::default()
        };
        let json = serde_json::to_value(client().body(&request)).unwrap();
        assert!(json.get("system").is_none());
    }

    #[tokio::test]
    async fn complete_joins_text_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-ant-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "claude-sonnet-4-20250514",
                "content": [
                    {"type": "text", "text": "Nutrition"},
                    {"type": "text", "text": "_Expert"}
                ],
                "usage": {"input_tokens": 10, "output_tokens": 2},
                "stop_reason": "end_turn"
            })))
            .mount(&server)
            .await;

        let response = client()
            .with_base_url(server.uri())
            .complete(LlmRequest {
                messages: vec![ChatMessage {
                    role: Role::User,
                    content: "분유".to_string(),
                }],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(response.content, "Nutrition_Expert");
        assert_eq!(response.usage.unwrap().prompt_tokens, 10);
    }

    #[tokio::test]
    async fn server_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = client()
            .with_base_url(server.uri())
            .complete(LlmRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SquadError::Llm(_)));
    }
}
