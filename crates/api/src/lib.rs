//! HTTP API for BabySquad.
//!
//! # Endpoints
//!
//! - `GET /health` - liveness and knowledge base availability
//! - `POST /chat` - `{thread_id, message}` to `{response}`
//! - `GET /sessions` - session summaries, most recent first
//! - `GET /sessions/{thread_id}` - stored history of one session
//!
//! Failures answer `{detail, code}` with 400 for invalid input, 404 for an
//! unknown session and 500 otherwise.
//!
//! ```text
//! Client (web UI / curl)
//!    │
//!    ▼
//! ┌─────────────────┐
//! │   API (Axum)    │ ◄── this crate
//! └────────┬────────┘
//!          │ process_turn(thread_id, message)
//!          ▼
//! ┌─────────────────┐
//! │ TurnOrchestrator│
//! └─────────────────┘
//! ```

pub mod auth;
pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use auth::{API_KEY_ENV, ApiKeyConfig};
pub use state::AppState;

/// `None` or a `*` entry allows any origin.
fn cors_layer(origins: Option<Vec<String>>) -> CorsLayer {
    let allow_origin = match origins {
        Some(origins) if !origins.iter().any(|o| o == "*") => {
            let parsed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(origin = %origin, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(parsed)
        }
        _ => AllowOrigin::any(),
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_router(state: Arc<AppState>, cors_origins: Option<Vec<String>>) -> Router {
    let mut router = Router::new()
        .route("/health", get(routes::health))
        .route("/chat", post(routes::chat))
        .route("/sessions", get(routes::list_sessions))
        .route("/sessions/{thread_id}", get(routes::get_session));

    if let Some(api_key) = state.api_key.clone() {
        router = router.layer(middleware::from_fn(move |request, next| {
            auth::require_api_key(api_key.clone(), request, next)
        }));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(
    state: Arc<AppState>,
    addr: SocketAddr,
    cors_origins: Option<Vec<String>>,
) -> anyhow::Result<()> {
    let router = create_router(state, cors_origins);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "BabySquad API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}
