//! Process-local session store.

use std::collections::HashMap;

use async_trait::async_trait;
use babysquad_common::{Message, Result, RoutingDecision};
use tokio::sync::RwLock;
use tracing::debug;

use crate::state::{ConversationState, SessionSummary};
use crate::store::ConversationStore;

/// Keeps every session in a map; contents are lost when the process exits.
#[derive(Default)]
pub struct InMemoryConversationStore {
    sessions: RwLock<HashMap<String, ConversationState>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get_or_create(&self, session_id: &str) -> Result<ConversationState> {
        if let Some(state) = self.sessions.read().await.get(session_id) {
            return Ok(state.clone());
        }

        let mut sessions = self.sessions.write().await;
        let state = sessions.entry(session_id.to_string()).or_insert_with(|| {
            debug!(session_id, "Session created");
            ConversationState::new(session_id)
        });
        Ok(state.clone())
    }

    async fn load(&self, session_id: &str) -> Result<Option<ConversationState>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn append_turn(
        &self,
        session_id: &str,
        user: Message,
        assistant: Message,
        decision: RoutingDecision,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| ConversationState::new(session_id))
            .record_turn(user, assistant, decision);
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .read()
            .await
            .values()
            .map(ConversationState::summary)
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}
