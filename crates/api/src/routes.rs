//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use babysquad_common::SquadError;
use babysquad_sessions::{ConversationState, SessionSummary};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub knowledge_available: bool,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        knowledge_available: state.knowledge_available,
    })
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub thread_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Error body shared by every failing route.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
    pub code: &'static str,
}

/// Maps core errors onto HTTP statuses: bad input is the caller's fault,
/// everything else fails the request with 500.
#[derive(Debug)]
pub enum ApiError {
    Squad(SquadError),
    SessionNotFound(String),
}

impl From<SquadError> for ApiError {
    fn from(e: SquadError) -> Self {
        Self::Squad(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, detail) = match self {
            Self::SessionNotFound(id) => (
                StatusCode::NOT_FOUND,
                "SESSION_NOT_FOUND",
                format!("No session with id '{id}'"),
            ),
            Self::Squad(e) => {
                let (status, code) = match &e {
                    SquadError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
                    SquadError::Llm(_) => (StatusCode::INTERNAL_SERVER_ERROR, "LLM_ERROR"),
                    SquadError::Session(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SESSION_ERROR"),
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
                };
                (status, code, e.to_string())
            }
        };
        (status, Json(ErrorBody { detail, code })).into_response()
    }
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    info!(
        thread_id = %request.thread_id,
        preview = %request.message.chars().take(50).collect::<String>(),
        "Chat request"
    );

    let response = state
        .orchestrator
        .process_turn(&request.thread_id, &request.message)
        .await
        .inspect_err(|e| error!(thread_id = %request.thread_id, error = %e, "Chat turn failed"))?;

    Ok(Json(ChatResponse { response }))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Result<Json<ConversationState>, ApiError> {
    state
        .orchestrator
        .store()
        .load(&thread_id)
        .await?
        .map(Json)
        .ok_or(ApiError::SessionNotFound(thread_id))
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    Ok(Json(state.orchestrator.store().list_sessions().await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_shape() {
        let request: ChatRequest =
            serde_json::from_str(r#"{"thread_id": "abc", "message": "낮잠 안자요"}"#).unwrap();
        assert_eq!(request.thread_id, "abc");
        assert_eq!(request.message, "낮잠 안자요");

        assert!(serde_json::from_str::<ChatRequest>(r#"{"message": "hi"}"#).is_err());
    }

    #[test]
    fn error_statuses() {
        let cases = [
            (SquadError::InvalidInput("empty".into()), StatusCode::BAD_REQUEST),
            (SquadError::Llm("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (SquadError::Session("locked".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).into_response().status(), status);
        }
        assert_eq!(
            ApiError::SessionNotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
    }
}
