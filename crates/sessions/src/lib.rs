//! Conversation state store for BabySquad.
//!
//! Every session is a caller-chosen id mapped to its ordered history and the
//! last routing decision. Sessions are created on first reference through
//! [`ConversationStore::get_or_create`]; there is no "already exists" error
//! path.

pub mod memory;
pub mod sqlite;
pub mod state;
pub mod store;

use std::path::PathBuf;
use std::sync::Arc;

use babysquad_common::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use memory::InMemoryConversationStore;
pub use sqlite::SqliteConversationStore;
pub use state::{ConversationState, SessionSummary};
pub use store::ConversationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_backend")]
    pub backend: SessionBackend,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_backend() -> SessionBackend {
    SessionBackend::Sqlite
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/sessions.sqlite")
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            db_path: default_db_path(),
        }
    }
}

/// Open the store selected by `config`.
pub async fn open_store(config: &SessionsConfig) -> Result<Arc<dyn ConversationStore>> {
    info!(backend = ?config.backend, "Opening conversation store");
    Ok(match config.backend {
        SessionBackend::Sqlite => Arc::new(SqliteConversationStore::open(&config.db_path).await?),
        SessionBackend::Memory => Arc::new(InMemoryConversationStore::new()),
    })
}
