//! Conversation state owned by a store.

use babysquad_common::{Message, RoutingDecision};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Accumulated dialogue for one session.
///
/// Only stores append to `history`, one user and one assistant message per
/// turn; callers get clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    session_id: String,
    history: Vec<Message>,
    last_routing_decision: Option<RoutingDecision>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            history: Vec::new(),
            last_routing_decision: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn from_parts(
        session_id: String,
        history: Vec<Message>,
        last_routing_decision: Option<RoutingDecision>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            history,
            last_routing_decision,
            created_at,
            updated_at,
        }
    }

    pub(crate) fn record_turn(&mut self, user: Message, assistant: Message, decision: RoutingDecision) {
        self.history.push(user);
        self.history.push(assistant);
        self.last_routing_decision = Some(decision);
        self.updated_at = Utc::now();
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn last_routing_decision(&self) -> Option<RoutingDecision> {
        self.last_routing_decision
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            message_count: self.history.len(),
            last_routing_decision: self.last_routing_decision,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub message_count: usize,
    pub last_routing_decision: Option<RoutingDecision>,
    pub updated_at: DateTime<Utc>,
}
