//! Common types and traits shared across BabySquad crates.
//!
//! This crate provides the dialogue model (`Message`) that the session store
//! persists and the agents consume, the router's `RoutingDecision`, the error
//! type every library crate returns, and the `Agent` capability implemented by
//! each specialist.

pub mod error;
pub mod message;
pub mod routing;
pub mod traits;

pub use error::{Result, SquadError};
pub use message::{Message, MessageRole, latest_user_text};
pub use routing::RoutingDecision;
pub use traits::{Agent, AgentReply};
