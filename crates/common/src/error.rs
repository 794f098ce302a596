//! Error types for BabySquad.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SquadError {
    /// The language model call failed (transport, status or malformed body).
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Knowledge store error: {0}")]
    Knowledge(String),

    #[error("Session store error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SquadError>;
