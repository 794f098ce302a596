//! BabySquad API server.
//!
//! Environment:
//! - `BABYSQUAD_API_KEY` - bearer token required on every route but `/health`
//! - `BABYSQUAD_CORS_ORIGINS` - comma-separated allowed origins (default: any)
//! - `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` - model provider keys
//! - `RUST_LOG` - log filter

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use babysquad_api::{ApiKeyConfig, AppState, serve};
use babysquad_coordinator::{BabySquad, BabySquadConfig};
use babysquad_sessions::SessionBackend;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "babysquad-api", version, about = "BabySquad HTTP API")]
struct Args {
    /// Path to babysquad.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides [server].port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address (overrides [server].bind)
    #[arg(short, long, env = "BABYSQUAD_BIND_ADDR")]
    bind: Option<String>,

    /// Keep sessions in memory only
    #[arg(long)]
    memory: bool,

    #[arg(long, env = "BABYSQUAD_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,babysquad=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = BabySquadConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if args.memory {
        config.sessions.backend = SessionBackend::Memory;
    }

    if config.server.bind == "0.0.0.0" {
        tracing::warn!("Binding to all interfaces; set BABYSQUAD_API_KEY and use a firewall");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let squad = BabySquad::from_config(config).await?;
    let mut state = AppState::from_squad(&squad);

    match ApiKeyConfig::from_env() {
        Some(key) => {
            state = state.with_api_key(key);
            tracing::info!("API key authentication enabled");
        }
        None => tracing::warn!("BABYSQUAD_API_KEY not set; the API is unauthenticated"),
    }

    serve(Arc::new(state), addr, args.cors_origins).await
}
