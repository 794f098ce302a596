//! Knowledge base for BabySquad.
//!
//! Reference documents are split into overlapping chunks, embedded and stored
//! in a SQLite-backed vector index. At answer time the [`Retriever`] searches
//! the index and renders the best passages with `(source: file, p.N)`
//! citations for a specialist's prompt.
//!
//! ```text
//!  data/*.txt|md|pdf ──► pages ──► TextSplitter ──► Embedder ──► VectorIndex
//!                                                                     │
//!  question ──► Retriever ──► KnowledgeStore::search ◄────────────────┘
//!                   │
//!                   ▼
//!           RetrievedContext (passages | unavailable | failed)
//! ```

pub mod embedding;
pub mod ingest;
pub mod retrieval;
pub mod splitter;
pub mod store;
pub mod types;

pub use embedding::{Embedder, EmbeddingError, FastEmbedder, OpenAiEmbedder, build_embedder};
pub use ingest::{IngestOutcome, IngestReport, Ingestor};
pub use retrieval::{KNOWLEDGE_UNAVAILABLE, RetrievedContext, RetrievedPassage, Retriever};
pub use splitter::TextSplitter;
pub use store::{KnowledgeStore, VectorIndex};
pub use types::{Chunk, ChunkMetadata, Document, EmbeddingProvider, KnowledgeConfig, SearchHit};
