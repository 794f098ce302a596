//! Shared application state.

use std::sync::Arc;
use std::time::Instant;

use babysquad_coordinator::{BabySquad, TurnOrchestrator};

use crate::auth::ApiKeyConfig;

/// The server holds no conversation state of its own; everything goes
/// through the orchestrator and its store.
pub struct AppState {
    pub orchestrator: Arc<TurnOrchestrator>,
    pub knowledge_available: bool,
    pub api_key: Option<ApiKeyConfig>,
    start_time: Instant,
}

impl AppState {
    pub fn new(orchestrator: Arc<TurnOrchestrator>) -> Self {
        Self {
            orchestrator,
            knowledge_available: false,
            api_key: None,
            start_time: Instant::now(),
        }
    }

    pub fn from_squad(squad: &BabySquad) -> Self {
        Self {
            knowledge_available: squad.retriever.is_available(),
            ..Self::new(squad.orchestrator.clone())
        }
    }

    pub fn with_api_key(mut self, api_key: ApiKeyConfig) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn with_knowledge_available(mut self, available: bool) -> Self {
        self.knowledge_available = available;
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
