use async_trait::async_trait;
use babysquad_common::{Message, Result, RoutingDecision};

use crate::state::{ConversationState, SessionSummary};

/// Durable mapping from session id to conversation state.
///
/// Different sessions are isolated from each other. Two turns in flight for
/// the same session are not ordered against each other; callers submit one
/// turn per session at a time.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Return the session, creating it empty if unseen. Concurrent calls for
    /// the same new id converge on one state.
    async fn get_or_create(&self, session_id: &str) -> Result<ConversationState>;

    async fn load(&self, session_id: &str) -> Result<Option<ConversationState>>;

    /// Append `user` then `assistant` and record `decision`, all or nothing.
    async fn append_turn(
        &self,
        session_id: &str,
        user: Message,
        assistant: Message,
        decision: RoutingDecision,
    ) -> Result<()>;

    /// All sessions, most recently updated first.
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>>;
}
