//! RAG (Retrieval-Augmented Generation) for agent knowledge bases
//!
//! Features:
//! - Document-type aware chunking (word packing, FAQ pairs, whole images)
//! - Embedding providers: Cohere, Ollama, offline hash embedder
//! - Content processing with optional media-to-text conversion
//! - Two vector store layouts:
//!   - unified: embeddings on the chunk rows, pgvector cosine search
//!   - split: embeddings in Qdrant (or in-process), chunk rows without vectors
//! - `RagService` facade for ingest, query, listing and purge

pub mod chunker;
pub mod cohere_embeddings;
pub mod embeddings;
pub mod ollama_embeddings;
pub mod processor;
pub mod service;
pub mod vector_store;

pub use chunker::{Chunker, ChunkerConfig};
pub use cohere_embeddings::{CohereEmbedder, CohereEmbeddingConfig};
pub use embeddings::{build_embedder, EmbedMode, Embedder, EmbeddingConfig, HashEmbedder};
pub use ollama_embeddings::{OllamaEmbedder, OllamaEmbeddingConfig};
pub use processor::ContentProcessor;
pub use service::{IngestedDocument, QueryDefaults, RagService};
pub use vector_store::{
    build_vector_store, IndexHit, IndexPoint, InMemoryIndex, QdrantIndex, QdrantIndexConfig,
    SplitVectorStore, UnifiedVectorStore, VectorIndex, VectorStore,
};

use thiserror::Error;

/// RAG errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("media processor not configured")]
    MediaNotConfigured,

    #[error(transparent)]
    Media(#[from] knowledge_media::MediaError),

    #[error(transparent)]
    Core(#[from] knowledge_core::Error),
}

impl From<RagError> for knowledge_core::Error {
    fn from(err: RagError) -> Self {
        use knowledge_core::Error;

        match err {
            RagError::Embedding(message) => Error::external("embedding", message),
            RagError::VectorStore(message) | RagError::Connection(message) => {
                Error::external("vector_index", message)
            }
            RagError::Validation(message) => Error::Validation(message),
            RagError::UnsupportedType(_) => Error::Validation(err.to_string()),
            RagError::MediaNotConfigured => Error::Config(err.to_string()),
            RagError::Media(e) => e.into(),
            RagError::Core(e) => e,
        }
    }
}
