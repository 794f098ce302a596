//! Integration tests for the HTTP surface.
//!
//! Each test binds a real server on an ephemeral port and talks to it with
//! `reqwest`.

use std::sync::Arc;

use async_trait::async_trait;
use babysquad_agents::SpecialistConfig;
use babysquad_api::{ApiKeyConfig, AppState, create_router};
use babysquad_common::{Result, SquadError};
use babysquad_coordinator::TurnOrchestrator;
use babysquad_knowledge::Retriever;
use babysquad_llm::{LlmClient, LlmRequest, LlmResponse};
use babysquad_sessions::InMemoryConversationStore;
use serde_json::{Value, json};

/// Routes on keywords and echoes the question; fails on "오류".
struct EchoLlm;

#[async_trait]
impl LlmClient for EchoLlm {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let latest = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let is_router = request
            .system_prompt
            .as_deref()
            .is_some_and(|s| s.starts_with("You are the supervisor"));

        let content = if is_router {
            if latest.contains("낮잠") { "Sleep_Expert" } else { "Nutrition_Expert" }.to_string()
        } else if latest.contains("오류") {
            return Err(SquadError::Llm("OpenAI API error 500: upstream".into()));
        } else {
            format!("답변: {latest}")
        };

        Ok(LlmResponse {
            content,
            model: "echo".into(),
            usage: None,
            finish_reason: None,
        })
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}

fn app_state() -> AppState {
    let orchestrator = TurnOrchestrator::from_components(
        Arc::new(EchoLlm),
        Retriever::unavailable(),
        SpecialistConfig::default(),
        Arc::new(InMemoryConversationStore::new()),
    );
    AppState::new(Arc::new(orchestrator))
}

async fn start_server(state: AppState) -> String {
    let router = create_router(Arc::new(state), None);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn post_chat(base: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{base}/chat"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn get_json(base: &str, path: &str) -> (u16, Value) {
    let resp = reqwest::get(format!("{base}{path}")).await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn health_reports_ok() {
    let base = start_server(app_state()).await;
    let (status, body) = get_json(&base, "/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["knowledge_available"], false);
}

#[tokio::test]
async fn chat_returns_response_and_grows_history() {
    let base = start_server(app_state()).await;

    let (status, body) = post_chat(&base, json!({"thread_id": "abc", "message": "4개월 아기 낮잠 안자요"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["response"], "답변: 4개월 아기 낮잠 안자요");

    let (status, _) = post_chat(&base, json!({"thread_id": "abc", "message": "분유는 얼마나 먹여야 돼?"})).await;
    assert_eq!(status, 200);

    let (status, session) = get_json(&base, "/sessions/abc").await;
    assert_eq!(status, 200);
    let history = session["history"].as_array().unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[1]["source_agent"], "sleep_expert");
    assert_eq!(history[3]["source_agent"], "nutrition_expert");
    assert_eq!(session["last_routing_decision"], "Nutrition_Expert");

    let (status, sessions) = get_json(&base, "/sessions").await;
    assert_eq!(status, 200);
    assert_eq!(sessions.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn empty_message_is_a_bad_request() {
    let base = start_server(app_state()).await;
    let (status, body) = post_chat(&base, json!({"thread_id": "abc", "message": "  "})).await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn model_failure_is_a_server_error() {
    let base = start_server(app_state()).await;
    let (status, body) = post_chat(&base, json!({"thread_id": "abc", "message": "오류를 내줘"})).await;
    assert_eq!(status, 500);
    assert_eq!(body["code"], "LLM_ERROR");
    assert!(body["detail"].as_str().unwrap().contains("upstream"));

    let (_, session) = get_json(&base, "/sessions/abc").await;
    assert_eq!(session["history"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let base = start_server(app_state()).await;
    let (status, body) = get_json(&base, "/sessions/nobody").await;
    assert_eq!(status, 404);
    assert_eq!(body["code"], "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn api_key_guards_everything_but_health() {
    let base = start_server(app_state().with_api_key(ApiKeyConfig::new("secret"))).await;
    let client = reqwest::Client::new();
    let body = json!({"thread_id": "abc", "message": "철분 음식 알려줘"});

    let (status, _) = get_json(&base, "/health").await;
    assert_eq!(status, 200);

    let resp = client.post(format!("{base}/chat")).json(&body).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = client
        .post(format!("{base}/chat"))
        .bearer_auth("wrong")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = client
        .post(format!("{base}/chat"))
        .bearer_auth("secret")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}
