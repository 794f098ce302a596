//! Specialist agents for BabySquad.
//!
//! - **Sleep Expert**: naps, night waking, routines
//! - **Nutrition Expert**: feeding amounts, solids, weaning
//! - **Baseline**: a plain retrieval-augmented assistant used only for
//!   evaluation
//!
//! Each specialist retrieves passages for the latest user message, builds a
//! system instruction from its persona plus grounding and citation rules, and
//! makes one language model call over the whole history.

pub mod baseline;
pub mod persona;
pub mod prompt;
pub mod specialist;

pub use babysquad_common::{Agent, AgentReply};
pub use baseline::BaselineAgent;
pub use persona::Persona;
pub use prompt::{build_system_instruction, extract_citations};
pub use specialist::{SpecialistAgent, SpecialistConfig};
