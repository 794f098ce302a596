//! Core agent trait.
//!
//! Defined in `babysquad-common` so that the coordinator and the agents
//! crate can both reference it without a dependency cycle.

use crate::{Message, Result};
use async_trait::async_trait;

/// What an agent produced for one turn.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub message: Message,
    /// Retrieved passages the answer was grounded on
    pub retrieved_passages: usize,
}

/// A role-bound responder that answers the latest user message in a
/// conversation.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable identifier, e.g. `sleep_expert`.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Answer the last user message in `history`, reporting how much
    /// retrieved context grounded it. Language model failures propagate to
    /// the caller.
    async fn answer(&self, history: &[Message]) -> Result<AgentReply>;

    /// The assistant message answering the last user message in `history`.
    async fn respond(&self, history: &[Message]) -> Result<Message> {
        Ok(self.answer(history).await?.message)
    }
}
