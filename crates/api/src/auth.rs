//! Optional bearer-token authentication.
//!
//! Enabled when `BABYSQUAD_API_KEY` is set. `/health` stays open.

use axum::{
    Json,
    body::Body,
    extract::Request,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::routes::ErrorBody;

pub const API_KEY_ENV: &str = "BABYSQUAD_API_KEY";

#[derive(Clone)]
pub struct ApiKeyConfig {
    key: Vec<u8>,
}

impl std::fmt::Debug for ApiKeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyConfig").field("key", &"<redacted>").finish()
    }
}

impl ApiKeyConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into().into_bytes(),
        }
    }

    /// Read the key from the environment; an empty value disables auth.
    pub fn from_env() -> Option<Self> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.is_empty())
            .map(Self::new)
    }

    /// Compares every byte so timing does not reveal the mismatch position.
    fn matches(&self, provided: &[u8]) -> bool {
        if self.key.len() != provided.len() {
            return false;
        }
        self.key
            .iter()
            .zip(provided)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

fn unauthorized(detail: &str, code: &'static str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorBody {
            detail: detail.to_string(),
            code,
        }),
    )
        .into_response()
}

pub async fn require_api_key(config: ApiKeyConfig, request: Request<Body>, next: Next) -> Response {
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    match bearer_token(request.headers()) {
        Some(token) if config.matches(token.as_bytes()) => next.run(request).await,
        Some(_) => {
            warn!(path = %request.uri().path(), "Rejected request with wrong API key");
            unauthorized("Invalid API key", "INVALID_API_KEY")
        }
        None => {
            warn!(path = %request.uri().path(), "Rejected request without API key");
            unauthorized(
                "Missing Authorization header. Use: Authorization: Bearer <key>",
                "MISSING_API_KEY",
            )
        }
    }
}
