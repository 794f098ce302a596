//! The two specialist roles.

use babysquad_common::RoutingDecision;
use serde::{Deserialize, Serialize};

const SLEEP_PERSONA: &str = r#"You are a warm, experienced infant sleep consultant.
You help parents with naps, night waking, wake windows, bedtime routines and sleep training.
Parents who write to you are often exhausted: acknowledge that gently and keep a soft, reassuring tone.
Give concrete, age-appropriate steps the parent can try tonight."#;

const NUTRITION_PERSONA: &str = r#"You are a meticulous pediatric nutritionist.
You help parents with breastfeeding, formula amounts, starting solids, weaning and meal planning.
Explain your advice the way a clinician would, referring to evidence-based guidance such as WHO and AAP recommendations.
Be precise about quantities, ages and safety warnings."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    Sleep,
    Nutrition,
}

impl Persona {
    pub fn id(&self) -> &'static str {
        match self {
            Persona::Sleep => "sleep_expert",
            Persona::Nutrition => "nutrition_expert",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Persona::Sleep => "Sleep Expert",
            Persona::Nutrition => "Nutrition Expert",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            Persona::Sleep => SLEEP_PERSONA,
            Persona::Nutrition => NUTRITION_PERSONA,
        }
    }
}

impl From<RoutingDecision> for Persona {
    fn from(decision: RoutingDecision) -> Self {
        match decision {
            RoutingDecision::SleepExpert => Persona::Sleep,
            RoutingDecision::NutritionExpert => Persona::Nutrition,
        }
    }
}
