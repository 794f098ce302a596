//! Retrieval adapter: turns search hits into a citable context block.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use babysquad_common::Result;
use serde::Serialize;
use tracing::{debug, warn};

use crate::embedding::Embedder;
use crate::store::{KnowledgeStore, VectorIndex};
use crate::types::{KnowledgeConfig, SearchHit};

/// Context text used when no index was loaded.
pub const KNOWLEDGE_UNAVAILABLE: &str =
    "The reference knowledge base is unavailable. Answer from general knowledge and do not cite sources.";

const NO_MATCHES: &str = "No reference passages matched this question.";

/// A passage ready for a prompt. `page_number` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievedPassage {
    pub text: String,
    pub source_file: String,
    pub page_number: u32,
}

impl RetrievedPassage {
    /// `(source: file, p.N)`, the form answers must cite.
    pub fn citation(&self) -> String {
        format!("(source: {}, p.{})", self.source_file, self.page_number)
    }
}

impl From<SearchHit> for RetrievedPassage {
    fn from(hit: SearchHit) -> Self {
        let source_file = Path::new(&hit.metadata.source)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or(hit.metadata.source);
        Self {
            text: hit.text,
            source_file,
            page_number: hit.metadata.page + 1,
        }
    }
}

/// Outcome of one retrieval. Never an error: failures degrade to text.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievedContext {
    Passages(Vec<RetrievedPassage>),
    Unavailable,
    Failed(String),
}

impl RetrievedContext {
    pub fn passages(&self) -> &[RetrievedPassage] {
        match self {
            RetrievedContext::Passages(passages) => passages,
            _ => &[],
        }
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RetrievedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievedContext::Passages(passages) if passages.is_empty() => f.write_str(NO_MATCHES),
            RetrievedContext::Passages(passages) => {
                for (i, passage) in passages.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n\n")?;
                    }
                    write!(f, "[{}] {}\n{}", i + 1, passage.citation(), passage.text)?;
                }
                Ok(())
            }
            RetrievedContext::Unavailable => f.write_str(KNOWLEDGE_UNAVAILABLE),
            RetrievedContext::Failed(reason) => write!(f, "Knowledge base search failed: {reason}"),
        }
    }
}

/// Wraps an optional [`KnowledgeStore`]; `None` means the index was never built.
#[derive(Clone)]
pub struct Retriever {
    store: Option<Arc<dyn KnowledgeStore>>,
}

impl Retriever {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store: Some(store) }
    }

    pub fn unavailable() -> Self {
        Self { store: None }
    }

    /// Open the persisted index named by `config`, degrading to
    /// [`Retriever::unavailable`] when it has not been ingested.
    pub async fn open(config: &KnowledgeConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let index = VectorIndex::open_existing(&config.index_path, &config.collection, embedder).await?;
        Ok(match index {
            Some(index) => Self::new(Arc::new(index)),
            None => {
                warn!(
                    path = %config.index_path.display(),
                    "Knowledge index not found; answers will not be grounded"
                );
                Self::unavailable()
            }
        })
    }

    pub fn is_available(&self) -> bool {
        self.store.is_some()
    }

    pub async fn retrieve(&self, query: &str, k: usize) -> RetrievedContext {
        let Some(store) = &self.store else {
            warn!("Knowledge store unavailable");
            return RetrievedContext::Unavailable;
        };

        match store.search(query, k).await {
            Ok(hits) => {
                debug!(k, hits = hits.len(), "Retrieved passages");
                RetrievedContext::Passages(hits.into_iter().map(RetrievedPassage::from).collect())
            }
            Err(e) => {
                warn!(error = %e, "Knowledge search failed");
                RetrievedContext::Failed(e.to_string())
            }
        }
    }
}
