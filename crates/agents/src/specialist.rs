//! Retrieval-grounded specialist agent.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use babysquad_common::{Agent, AgentReply, Message, Result, SquadError, latest_user_text};
use babysquad_knowledge::Retriever;
use babysquad_llm::{LlmClient, complete_with_history};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::persona::Persona;
use crate::prompt::{build_system_instruction, extract_citations};

/// Tuning shared by all specialists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialistConfig {
    /// Passages retrieved per answer
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Sampling temperature; `None` leaves the provider default
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_top_k() -> usize {
    3
}

impl Default for SpecialistConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            temperature: Some(0.0),
        }
    }
}

/// Answers with a persona, grounded in passages retrieved for the latest
/// user message. Makes exactly one model call and never retries.
pub struct SpecialistAgent {
    persona: Persona,
    config: SpecialistConfig,
    llm: Arc<dyn LlmClient>,
    retriever: Retriever,
}

impl SpecialistAgent {
    pub fn new(
        persona: Persona,
        config: SpecialistConfig,
        llm: Arc<dyn LlmClient>,
        retriever: Retriever,
    ) -> Self {
        Self {
            persona,
            config,
            llm,
            retriever,
        }
    }

    pub fn persona(&self) -> Persona {
        self.persona
    }
}

#[async_trait]
impl Agent for SpecialistAgent {
    fn id(&self) -> &str {
        self.persona.id()
    }

    fn name(&self) -> &str {
        self.persona.display_name()
    }

    async fn answer(&self, history: &[Message]) -> Result<AgentReply> {
        let query = latest_user_text(history)
            .ok_or_else(|| SquadError::InvalidInput("history has no user message".into()))?;
        let started = Instant::now();

        let context = self.retriever.retrieve(query, self.config.top_k).await;
        let retrieved_passages = context.passages().len();
        debug!(agent = %self.id(), passages = retrieved_passages, "Context retrieved");

        let instruction = build_system_instruction(self.persona.instruction(), &context);
        let text =
            complete_with_history(self.llm.as_ref(), &instruction, history, self.config.temperature)
                .await?;

        let citations = extract_citations(&text);
        info!(
            agent = %self.id(),
            citations = citations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Specialist answered"
        );

        Ok(AgentReply {
            message: Message::from_agent(self.id(), text).with_citations(citations),
            retrieved_passages,
        })
    }
}
