//! Turn coordination for BabySquad.
//!
//! The coordinator owns the single public operation delivery surfaces call,
//! [`TurnOrchestrator::process_turn`]. Each turn:
//!
//! ```text
//! (session_id, message)
//!      │
//!      ▼
//! ┌──────────────────┐   get_or_create / append_turn   ┌───────────────────┐
//! │ TurnOrchestrator │ ◄─────────────────────────────► │ ConversationStore │
//! └────────┬─────────┘                                 └───────────────────┘
//!          │ route(history)
//!          ▼
//!    ┌────────────┐
//!    │ Supervisor │ ──► Sleep_Expert | Nutrition_Expert
//!    └─────┬──────┘
//!          ▼
//!   SpecialistAgent::respond(history) ──► reply text
//! ```
//!
//! It also loads `babysquad.toml` and runs the baseline-vs-team evaluation.

pub mod bootstrap;
pub mod config;
pub mod evaluation;
pub mod orchestrator;
pub mod routing;

pub use bootstrap::BabySquad;
pub use config::{BabySquadConfig, DEFAULT_CONFIG_FILE, EvalConfig, ServerConfig};
pub use evaluation::{
    DEFAULT_QUESTIONS, EVAL_SESSION, EvalRecord, EvalReport, Evaluator, Winner, default_questions,
    load_questions,
};
pub use orchestrator::{TurnOrchestrator, TurnOutcome, TurnPhase};
pub use routing::Supervisor;
