//! Knowledge types and configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a chunk came from. `page` is 0-based, as produced by ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub page: u32,
}

/// One ranked match returned by a [`KnowledgeStore`](crate::KnowledgeStore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity against the query, higher is closer
    pub score: f32,
}

/// A single page of a loaded source file.
#[derive(Debug, Clone)]
pub struct Document {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A split piece of a [`Document`], ready to embed.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local ONNX models through fastembed
    Fastembed,
    /// Any OpenAI-compatible `/v1/embeddings` endpoint
    Openai,
}

/// Configuration for the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// SQLite file holding the vector index
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_embedding_provider")]
    pub embedding_provider: EmbeddingProvider,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Base URL for the remote embedding provider
    #[serde(default)]
    pub embedding_api_url: Option<String>,

    /// Falls back to OPENAI_API_KEY when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_api_key: Option<String>,

    /// Chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Passages retrieved per specialist call
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./knowledge_db/index.sqlite")
}

fn default_collection() -> String {
    "baby_knowledge".into()
}

fn default_embedding_provider() -> EmbeddingProvider {
    EmbeddingProvider::Fastembed
}

fn default_embedding_model() -> String {
    // Korean and English source material
    "multilingual-e5-small".into()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_top_k() -> usize {
    3
}

fn default_embed_batch_size() -> usize {
    32
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            collection: default_collection(),
            embedding_provider: default_embedding_provider(),
            embedding_model: default_embedding_model(),
            embedding_api_url: None,
            embedding_api_key: None,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            embed_batch_size: default_embed_batch_size(),
        }
    }
}

impl KnowledgeConfig {
    pub fn resolve_embedding_api_key(&self) -> Option<String> {
        self.embedding_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_ingestion_settings() {
        let config: KnowledgeConfig = toml::from_str("").unwrap();
        assert_eq!(config.collection, "baby_knowledge");
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.embedding_provider, EmbeddingProvider::Fastembed);
    }

    #[test]
    fn provider_parses_lowercase() {
        let config: KnowledgeConfig = toml::from_str(
            r#"
embedding_provider = "openai"
embedding_model = "text-embedding-3-small"
top_k = 5
"#,
        )
        .unwrap();
        assert_eq!(config.embedding_provider, EmbeddingProvider::Openai);
        assert_eq!(config.top_k, 5);
    }
}
