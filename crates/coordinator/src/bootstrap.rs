//! Startup wiring from a [`BabySquadConfig`].

use std::sync::Arc;

use babysquad_agents::{BaselineAgent, SpecialistConfig};
use babysquad_common::Result;
use babysquad_knowledge::{Embedder, Retriever, build_embedder};
use babysquad_llm::{LlmClient, build_llm_client};
use babysquad_sessions::{ConversationStore, open_store};
use tracing::info;

use crate::config::BabySquadConfig;
use crate::evaluation::Evaluator;
use crate::orchestrator::TurnOrchestrator;

/// Long-lived components built once at startup and shared by reference.
pub struct BabySquad {
    pub config: BabySquadConfig,
    pub llm: Arc<dyn LlmClient>,
    /// Evaluation judge; the answering client unless `[eval].judge_model` is set
    pub judge: Arc<dyn LlmClient>,
    pub embedder: Arc<dyn Embedder>,
    pub retriever: Retriever,
    pub store: Arc<dyn ConversationStore>,
    pub orchestrator: Arc<TurnOrchestrator>,
}

impl BabySquad {
    pub async fn from_config(config: BabySquadConfig) -> Result<Self> {
        let llm = build_llm_client(&config.llm)?;
        let judge = match config.eval.judge_model {
            Some(_) => build_llm_client(&config.judge_llm())?,
            None => llm.clone(),
        };
        let embedder = build_embedder(&config.knowledge)?;
        let retriever = Retriever::open(&config.knowledge, embedder.clone()).await?;
        let store = open_store(&config.sessions).await?;

        let orchestrator = Arc::new(TurnOrchestrator::from_components(
            llm.clone(),
            retriever.clone(),
            Self::specialist_config(&config),
            store.clone(),
        ));

        info!(
            knowledge = retriever.is_available(),
            judge = %judge.model_name(),
            sessions = ?config.sessions.backend,
            "BabySquad initialized"
        );

        Ok(Self {
            config,
            llm,
            judge,
            embedder,
            retriever,
            store,
            orchestrator,
        })
    }

    fn specialist_config(config: &BabySquadConfig) -> SpecialistConfig {
        SpecialistConfig {
            top_k: config.knowledge.top_k,
            temperature: config.llm.temperature,
        }
    }

    pub fn baseline(&self) -> BaselineAgent {
        BaselineAgent::new(
            self.llm.clone(),
            self.retriever.clone(),
            self.config.knowledge.top_k,
        )
    }

    pub fn evaluator(&self) -> Evaluator {
        Evaluator::new(self.baseline(), self.orchestrator.clone(), self.judge.clone())
    }
}
