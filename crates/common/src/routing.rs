//! The router's closed set of destinations.

use serde::{Deserialize, Serialize};

/// Which specialist handles a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoutingDecision {
    #[serde(rename = "Sleep_Expert")]
    SleepExpert,
    #[serde(rename = "Nutrition_Expert")]
    NutritionExpert,
}

impl RoutingDecision {
    /// Option names offered to the routing model, in prompt order.
    pub const OPTIONS: [RoutingDecision; 2] = [Self::NutritionExpert, Self::SleepExpert];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SleepExpert => "Sleep_Expert",
            Self::NutritionExpert => "Nutrition_Expert",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Sleep_Expert" => Some(Self::SleepExpert),
            "Nutrition_Expert" => Some(Self::NutritionExpert),
            _ => None,
        }
    }

    /// Map raw model output to a decision. "Nutrition" is checked before
    /// "Sleep", and anything else falls back to nutrition, so every output
    /// yields a valid route.
    pub fn from_model_output(raw: &str) -> Self {
        if raw.contains("Nutrition") {
            Self::NutritionExpert
        } else if raw.contains("Sleep") {
            Self::SleepExpert
        } else {
            Self::NutritionExpert
        }
    }
}

impl std::fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
