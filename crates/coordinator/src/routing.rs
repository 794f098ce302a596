//! Supervisor: picks the specialist for a turn.

use std::sync::Arc;

use babysquad_common::{Message, Result, RoutingDecision};
use babysquad_llm::{LlmClient, complete_with_history};
use tracing::debug;

/// Routes each turn to exactly one specialist with a single model call.
pub struct Supervisor {
    llm: Arc<dyn LlmClient>,
}

impl Supervisor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Instruction listing the options in the order the model sees them.
    pub fn instruction() -> String {
        let options = RoutingDecision::OPTIONS
            .iter()
            .map(|option| format!("\"{option}\""))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "You are the supervisor of a parenting help desk with these specialists: [{options}].\n\
             Nutrition_Expert handles feeding, formula, breast milk, solids, weaning and \
             nutrients. Sleep_Expert handles naps, night waking, sleep routines and sleep \
             training.\n\
             Read the conversation and decide which specialist should answer the latest \
             message. Answer with the name only."
        )
    }

    /// The model's answer is normalized, so malformed output still yields a
    /// valid route. Model failures propagate.
    pub async fn route(&self, history: &[Message]) -> Result<RoutingDecision> {
        let raw =
            complete_with_history(self.llm.as_ref(), &Self::instruction(), history, Some(0.0))
                .await?;
        let decision = RoutingDecision::from_model_output(raw.trim());
        debug!(raw = %raw.trim(), decision = %decision, "Supervisor decided");
        Ok(decision)
    }
}
