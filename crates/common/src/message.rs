//! Dialogue messages exchanged within a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// One turn of dialogue.
///
/// Messages are immutable once built: the fields are only readable, and the
/// builder-style methods consume `self`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    role: MessageRole,

    text: String,

    /// Citations in `(source: file, p.N)` form, in order of appearance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    source_citations: Vec<String>,

    /// Specialist that produced the message (assistant messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_agent: Option<String>,

    created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            source_citations: Vec::new(),
            source_agent: None,
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, text)
    }

    pub fn from_agent(agent: impl Into<String>, text: impl Into<String>) -> Self {
        Self::assistant(text).with_agent(agent)
    }

    pub fn with_citations(mut self, citations: Vec<String>) -> Self {
        self.source_citations = citations;
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.source_agent = Some(agent.into());
        self
    }

    /// Override the creation time, used when rehydrating from storage.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn role(&self) -> MessageRole {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source_citations(&self) -> &[String] {
        &self.source_citations
    }

    pub fn source_agent(&self) -> Option<&str> {
        self.source_agent.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// The most recent user message in `history`, if any.
pub fn latest_user_text(history: &[Message]) -> Option<&str> {
    history
        .iter()
        .rev()
        .find(|m| m.role() == MessageRole::User)
        .map(|m| m.text())
}
