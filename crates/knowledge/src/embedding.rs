//! Embedding providers for the vector index.
//!
//! Two implementations of [`Embedder`]: a local fastembed model loaded lazily
//! on first use, and a remote OpenAI-compatible `/v1/embeddings` endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use babysquad_common::{Result, SquadError};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task;
use tracing::{debug, info, instrument};

use crate::types::{EmbeddingProvider, KnowledgeConfig};

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Failed to initialize embedding model: {0}")]
    ModelInit(String),

    #[error("Failed to generate embeddings: {0}")]
    Generation(String),

    #[error("Blocking task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl From<EmbeddingError> for SquadError {
    fn from(e: EmbeddingError) -> Self {
        SquadError::Knowledge(e.to_string())
    }
}

/// Turns text into vectors. Documents and queries are embedded separately
/// because some models expect different prefixes for each.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier recorded with every collection built by this embedder.
    fn model_id(&self) -> &str;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_documents(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Generation("Empty embedding result".into()).into())
    }
}

/// Local embedding through fastembed. The model is downloaded and loaded on
/// the first embed call and shared afterwards.
pub struct FastEmbedder {
    model_id: String,
    model_name: EmbeddingModel,
    model: OnceCell<Arc<TextEmbedding>>,
}

impl FastEmbedder {
    pub fn from_model_str(model_id: &str) -> std::result::Result<Self, EmbeddingError> {
        let model_name = match model_id {
            "multilingual-e5-small" => EmbeddingModel::MultilingualE5Small,
            "multilingual-e5-base" => EmbeddingModel::MultilingualE5Base,
            "multilingual-e5-large" => EmbeddingModel::MultilingualE5Large,
            "paraphrase-multilingual-minilm-l12-v2" => EmbeddingModel::ParaphraseMLMiniLML12V2,
            "all-MiniLM-L6-v2" => EmbeddingModel::AllMiniLML6V2,
            "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
            "bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
            other => {
                return Err(EmbeddingError::ModelInit(format!(
                    "Unknown embedding model: '{other}'. Supported: multilingual-e5-small, \
                     multilingual-e5-base, multilingual-e5-large, \
                     paraphrase-multilingual-minilm-l12-v2, all-MiniLM-L6-v2, \
                     bge-small-en-v1.5, bge-base-en-v1.5"
                )));
            }
        };

        Ok(Self {
            model_id: model_id.to_string(),
            model_name,
            model: OnceCell::new(),
        })
    }

    fn is_e5(&self) -> bool {
        self.model_id.starts_with("multilingual-e5")
    }

    #[instrument(skip(self))]
    fn get_or_init_model(&self) -> std::result::Result<Arc<TextEmbedding>, EmbeddingError> {
        self.model
            .get_or_try_init(|| {
                info!(model = %self.model_id, "Loading embedding model");

                let mut options = InitOptions::new(self.model_name.clone());
                options.show_download_progress = true;
                let model = TextEmbedding::try_new(options)
                    .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?;

                info!(model = %self.model_id, "Embedding model ready");
                Ok(Arc::new(model))
            })
            .cloned()
    }

    async fn embed_prefixed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.get_or_init_model()?;

        // fastembed is synchronous
        let embeddings = task::spawn_blocking(move || {
            model
                .embed(texts, None)
                .map_err(|e| EmbeddingError::Generation(e.to_string()))
        })
        .await
        .map_err(EmbeddingError::from)??;

        debug!(
            batch_size = embeddings.len(),
            dimension = embeddings.first().map(|e| e.len()).unwrap_or(0),
            "Generated embeddings"
        );
        Ok(embeddings)
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let texts = if self.is_e5() {
            texts.iter().map(|t| format!("passage: {t}")).collect()
        } else {
            texts.to_vec()
        };
        self.embed_prefixed(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let text = if self.is_e5() {
            format!("query: {text}")
        } else {
            text.to_string()
        };
        self.embed_prefixed(vec![text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Generation("Empty embedding result".into()).into())
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

/// Remote embedding via an OpenAI-compatible `/v1/embeddings` endpoint.
pub struct OpenAiEmbedder {
    base_url: String,
    model: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(base_url: Option<String>, model: String, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or_else(|| "https://api.openai.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            api_key,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut req = self
            .http_client
            .post(format!("{}/v1/embeddings", self.base_url))
            .json(&EmbeddingsRequest {
                model: &self.model,
                input: texts,
            });
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| EmbeddingError::Generation(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Generation(format!("API error {status}: {body}")).into());
        }

        let mut parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Generation(format!("invalid response: {e}")))?;

        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::Generation(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            ))
            .into());
        }

        parsed.data.sort_by_key(|item| item.index);
        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

/// Build the embedder selected by `config`.
pub fn build_embedder(config: &KnowledgeConfig) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.embedding_provider {
        EmbeddingProvider::Fastembed => Arc::new(FastEmbedder::from_model_str(&config.embedding_model)?),
        EmbeddingProvider::Openai => Arc::new(OpenAiEmbedder::new(
            config.embedding_api_url.clone(),
            config.embedding_model.clone(),
            config.resolve_embedding_api_key(),
        )),
    };
    info!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        "Embedder configured"
    );
    Ok(embedder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn known_and_unknown_model_names() {
        assert!(FastEmbedder::from_model_str("multilingual-e5-small").is_ok());
        assert!(FastEmbedder::from_model_str("all-MiniLM-L6-v2").is_ok());
        assert!(FastEmbedder::from_model_str("not-a-model").is_err());
    }

    #[test]
    fn e5_models_are_detected() {
        assert!(FastEmbedder::from_model_str("multilingual-e5-base").unwrap().is_e5());
        assert!(!FastEmbedder::from_model_str("bge-small-en-v1.5").unwrap().is_e5());
    }

    #[test]
    fn unknown_fastembed_model_is_a_knowledge_error() {
        let config = KnowledgeConfig {
            embedding_model: "nope".into(),
            ..Default::default()
        };
        assert!(matches!(build_embedder(&config), Err(SquadError::Knowledge(_))));
    }

    #[tokio::test]
    async fn remote_embeddings_are_reordered_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(body_partial_json(serde_json::json!({"model": "text-embedding-3-small"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]
            })))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(Some(server.uri()), "text-embedding-3-small".into(), None);
        let vectors = embedder
            .embed_documents(&["낮잠".to_string(), "분유".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn remote_error_status_is_a_knowledge_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(Some(server.uri()), "m".into(), None);
        let err = embedder.embed_query("수면").await.unwrap_err();
        assert!(matches!(err, SquadError::Knowledge(_)));
    }

    #[tokio::test]
    #[ignore = "Downloads model from network, slow"]
    async fn fastembed_related_texts_are_closer() {
        let embedder = FastEmbedder::from_model_str("multilingual-e5-small").unwrap();
        let docs = embedder
            .embed_documents(&[
                "아기 낮잠 횟수는 월령에 따라 달라집니다".to_string(),
                "분유 수유량은 체중에 따라 조절합니다".to_string(),
            ])
            .await
            .unwrap();
        let query = embedder.embed_query("낮잠을 몇 번 자야 하나요").await.unwrap();

        let sim = |a: &[f32], b: &[f32]| crate::store::cosine_similarity(a, b);
        assert!(sim(&query, &docs[0]) > sim(&query, &docs[1]));
    }
}
