//! Persisted vector index on SQLite.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use babysquad_common::{Result, SquadError};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{ConnectOptions, Row};
use tracing::{debug, info};

use crate::embedding::Embedder;
use crate::types::{Chunk, ChunkMetadata, SearchHit};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    name            TEXT PRIMARY KEY,
    embedding_model TEXT NOT NULL,
    dimension       INTEGER NOT NULL,
    updated_at      TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS chunks (
    collection TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
    ordinal    INTEGER NOT NULL,
    source     TEXT NOT NULL,
    page       INTEGER NOT NULL,
    text       TEXT NOT NULL,
    embedding  BLOB NOT NULL,
    PRIMARY KEY (collection, ordinal)
);
"#;

/// Similarity search over reference chunks.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Up to `k` hits, best first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>>;
}

fn db_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> SquadError {
    move |e| SquadError::Knowledge(format!("{context}: {e}"))
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// A named collection of embedded chunks in a SQLite file.
pub struct VectorIndex {
    pool: SqlitePool,
    collection: String,
    embedder: Arc<dyn Embedder>,
}

impl VectorIndex {
    /// Open the index at `path`, creating the file and schema if needed.
    pub async fn open(path: &Path, collection: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Self::connect(path, true, collection, embedder).await
    }

    /// Open an index that ingestion already wrote. `None` when no index file
    /// exists at `path`.
    pub async fn open_existing(
        path: &Path,
        collection: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Option<Self>> {
        if !tokio::fs::try_exists(path).await? {
            info!(path = %path.display(), "No knowledge index on disk");
            return Ok(None);
        }
        Self::connect(path, false, collection, embedder).await.map(Some)
    }

    async fn connect(
        path: &Path,
        create: bool,
        collection: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(db_err("Failed to open knowledge index"))?;

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(db_err("Failed to create knowledge schema"))?;

        debug!(path = %path.display(), collection, "Knowledge index opened");

        Ok(Self {
            pool,
            collection: collection.to_string(),
            embedder,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Replace everything in the collection with `chunks`. `embeddings[i]`
    /// belongs to `chunks[i]`.
    pub async fn replace_collection(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(SquadError::Knowledge(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }
        let dimension = embeddings.first().map(Vec::len).unwrap_or(0);
        if embeddings.iter().any(|e| e.len() != dimension) {
            return Err(SquadError::Knowledge("Embeddings have mixed dimensions".into()));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin transaction"))?;

        sqlx::query("DELETE FROM chunks WHERE collection = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to clear collection"))?;

        sqlx::query(
            r#"
            INSERT INTO collections (name, embedding_model, dimension, updated_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(name) DO UPDATE SET
                embedding_model = excluded.embedding_model,
                dimension = excluded.dimension,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.collection)
        .bind(self.embedder.model_id())
        .bind(dimension as i64)
        .execute(&mut *tx)
        .await
        .map_err(db_err("Failed to record collection"))?;

        for (ordinal, (chunk, embedding)) in chunks.iter().zip(embeddings).enumerate() {
            sqlx::query(
                "INSERT INTO chunks (collection, ordinal, source, page, text, embedding) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&self.collection)
            .bind(ordinal as i64)
            .bind(&chunk.metadata.source)
            .bind(chunk.metadata.page as i64)
            .bind(&chunk.text)
            .bind(encode_vector(embedding))
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to insert chunk"))?;
        }

        tx.commit().await.map_err(db_err("Failed to commit collection"))?;

        info!(
            collection = %self.collection,
            chunks = chunks.len(),
            dimension,
            "Collection replaced"
        );
        Ok(())
    }

    pub async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err("Failed to count chunks"))?;
        Ok(count as usize)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl KnowledgeStore for VectorIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let stored_model: Option<String> =
            sqlx::query_scalar("SELECT embedding_model FROM collections WHERE name = ?")
                .bind(&self.collection)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err("Failed to read collection"))?;

        let Some(stored_model) = stored_model else {
            debug!(collection = %self.collection, "Collection not ingested yet");
            return Ok(Vec::new());
        };
        if stored_model != self.embedder.model_id() {
            return Err(SquadError::Knowledge(format!(
                "Collection '{}' was built with '{}' but the configured embedder is '{}'",
                self.collection,
                stored_model,
                self.embedder.model_id()
            )));
        }

        let query_vector = self.embedder.embed_query(query).await?;

        let rows = sqlx::query(
            "SELECT source, page, text, embedding FROM chunks WHERE collection = ? ORDER BY ordinal",
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to read chunks"))?;

        let mut hits: Vec<SearchHit> = rows
            .into_iter()
            .map(|row| {
                let embedding: Vec<u8> = row.get("embedding");
                let page: i64 = row.get("page");
                SearchHit {
                    score: cosine_similarity(&query_vector, &decode_vector(&embedding)),
                    text: row.get("text"),
                    metadata: ChunkMetadata {
                        source: row.get("source"),
                        page: page as u32,
                    },
                }
            })
            .collect();

        // stable sort keeps ingestion order among equal scores
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(k);

        debug!(collection = %self.collection, k, returned = hits.len(), "Vector search");
        Ok(hits)
    }
}
