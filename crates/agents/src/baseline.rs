//! Single-agent baseline used for comparison.

use std::sync::Arc;

use async_trait::async_trait;
use babysquad_common::{Agent, AgentReply, Message, Result, SquadError, latest_user_text};
use babysquad_knowledge::Retriever;
use babysquad_llm::{LlmClient, complete_with_history};
use tracing::info;

use crate::prompt::extract_citations;

const BASELINE_PROMPT: &str = "You are a helpful assistant answering parenting questions. \
Use the reference information below if it is relevant.\n\nReference information:\n";

/// A persona-less assistant that sees only the latest question plus the same
/// retrieved context the specialists get.
pub struct BaselineAgent {
    llm: Arc<dyn LlmClient>,
    retriever: Retriever,
    top_k: usize,
    temperature: Option<f32>,
}

impl BaselineAgent {
    pub fn new(llm: Arc<dyn LlmClient>, retriever: Retriever, top_k: usize) -> Self {
        Self {
            llm,
            retriever,
            top_k,
            temperature: Some(0.0),
        }
    }

    /// Answer a standalone question.
    pub async fn ask(&self, question: &str) -> Result<String> {
        Ok(self.respond(&[Message::user(question)]).await?.text().to_string())
    }
}

#[async_trait]
impl Agent for BaselineAgent {
    fn id(&self) -> &str {
        "baseline"
    }

    fn name(&self) -> &str {
        "Baseline Assistant"
    }

    async fn answer(&self, history: &[Message]) -> Result<AgentReply> {
        let question = latest_user_text(history)
            .ok_or_else(|| SquadError::InvalidInput("history has no user message".into()))?;

        let context = self.retriever.retrieve(question, self.top_k).await;
        let instruction = format!("{BASELINE_PROMPT}{}", context.render());

        let text = complete_with_history(
            self.llm.as_ref(),
            &instruction,
            &[Message::user(question)],
            self.temperature,
        )
        .await?;

        let retrieved_passages = context.passages().len();
        info!(agent = "baseline", passages = retrieved_passages, "Baseline answered");
        let citations = extract_citations(&text);
        Ok(AgentReply {
            message: Message::from_agent(self.id(), text).with_citations(citations),
            retrieved_passages,
        })
    }
}
