//! Turn orchestration.
//!
//! ```text
//! Start ──► Routing ──► SpecialistExecution ──► Done
//!                 │            ├─ Sleep Expert
//!                 └────────────┴─ Nutrition Expert
//! ```
//!
//! A turn is one routing call followed by one specialist call. The user and
//! assistant messages are persisted together once the specialist returns; a
//! turn that fails anywhere leaves the stored history as it was.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use babysquad_agents::{Persona, SpecialistAgent, SpecialistConfig};
use babysquad_common::{Agent, AgentReply, Message, Result, RoutingDecision, SquadError};
use babysquad_knowledge::Retriever;
use babysquad_llm::LlmClient;
use babysquad_sessions::{ConversationState, ConversationStore};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::routing::Supervisor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Start,
    Routing,
    SpecialistExecution,
    Done,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::Routing => "routing",
            Self::SpecialistExecution => "specialist_execution",
            Self::Done => "done",
        })
    }
}

/// Result of a completed turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub session_id: String,
    pub decision: RoutingDecision,
    pub reply: Message,
    /// Passages retrieved to ground the reply
    pub retrieval_hits: usize,
    /// Stored history length after the turn
    pub history_len: usize,
}

pub struct TurnOrchestrator {
    supervisor: Supervisor,
    sleep: Arc<dyn Agent>,
    nutrition: Arc<dyn Agent>,
    store: Arc<dyn ConversationStore>,
}

impl TurnOrchestrator {
    pub fn new(
        supervisor: Supervisor,
        sleep: Arc<dyn Agent>,
        nutrition: Arc<dyn Agent>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            supervisor,
            sleep,
            nutrition,
            store,
        }
    }

    /// Wire the supervisor and both specialists onto one model client and one
    /// retriever.
    pub fn from_components(
        llm: Arc<dyn LlmClient>,
        retriever: Retriever,
        specialist: SpecialistConfig,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        let sleep = SpecialistAgent::new(
            Persona::Sleep,
            specialist.clone(),
            llm.clone(),
            retriever.clone(),
        );
        let nutrition = SpecialistAgent::new(Persona::Nutrition, specialist, llm.clone(), retriever);
        info!(
            sleep = %sleep.name(),
            nutrition = %nutrition.name(),
            model = %llm.model_name(),
            "Turn orchestrator ready"
        );
        Self::new(Supervisor::new(llm), Arc::new(sleep), Arc::new(nutrition), store)
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    fn specialist(&self, decision: RoutingDecision) -> &Arc<dyn Agent> {
        match decision {
            RoutingDecision::SleepExpert => &self.sleep,
            RoutingDecision::NutritionExpert => &self.nutrition,
        }
    }

    /// Answer `message` within `session_id`, creating the session on first
    /// use. Returns the assistant's text.
    pub async fn process_turn(&self, session_id: &str, message: &str) -> Result<String> {
        Ok(self.run_turn(session_id, message).await?.reply.text().to_string())
    }

    pub async fn run_turn(&self, session_id: &str, message: &str) -> Result<TurnOutcome> {
        if message.trim().is_empty() {
            return Err(SquadError::InvalidInput("message must not be empty".into()));
        }
        let started = Instant::now();
        let mut phase = TurnPhase::Start;
        debug!(session_id, %phase, "Turn received");

        let state: ConversationState = self.store.get_or_create(session_id).await?;
        let user = Message::user(message);
        let mut history = state.history().to_vec();
        history.push(user.clone());

        phase = TurnPhase::Routing;
        debug!(session_id, %phase, history_len = history.len(), "Routing turn");
        let decision = self
            .supervisor
            .route(&history)
            .await
            .inspect_err(|e| warn!(session_id, %phase, error = %e, "Turn failed"))?;

        phase = TurnPhase::SpecialistExecution;
        let specialist = self.specialist(decision);
        debug!(session_id, %phase, %decision, agent = %specialist.id(), "Dispatching");
        let AgentReply {
            message: reply,
            retrieved_passages: retrieval_hits,
        } = specialist
            .answer(&history)
            .await
            .inspect_err(|e| warn!(session_id, %phase, error = %e, "Turn failed"))?;

        self.store
            .append_turn(session_id, user, reply.clone(), decision)
            .await?;

        phase = TurnPhase::Done;
        let history_len = history.len() + 1;
        info!(
            session_id,
            %phase,
            %decision,
            retrieval_hits,
            citations = reply.source_citations().len(),
            history_len,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Turn complete"
        );

        Ok(TurnOutcome {
            session_id: session_id.to_string(),
            decision,
            reply,
            retrieval_hits,
            history_len,
        })
    }
}
