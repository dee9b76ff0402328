//! Vector stores
//!
//! Two layouts behind one [`VectorStore`] trait:
//! - [`UnifiedVectorStore`]: chunk rows carry their embedding and the
//!   relational store runs the cosine search
//! - [`SplitVectorStore`]: vectors live in a [`VectorIndex`] (Qdrant or
//!   in-process), chunk rows hold content and metadata only

mod memory;
mod qdrant;
mod split;
mod unified;

use std::sync::Arc;

use async_trait::async_trait;
use knowledge_config::{IndexBackend, VectorStoreLayout, VectorStoreSettings};
use knowledge_core::{ChunkRepository, DocumentChunk, RetrievedChunk};
use uuid::Uuid;

use crate::RagError;

pub use memory::InMemoryIndex;
pub use qdrant::{QdrantIndex, QdrantIndexConfig};
pub use split::SplitVectorStore;
pub use unified::UnifiedVectorStore;

/// Chunk storage with similarity search, scoped by agent
#[async_trait]
pub trait VectorStore: Send + Sync + 'static {
    /// Persist one fully built chunk (id assigned, embedding present)
    async fn store(&self, chunk: &DocumentChunk) -> Result<(), RagError>;

    /// Most similar chunks of `agent_id` with similarity above `threshold`,
    /// best first, at most `top_k`
    async fn search(
        &self,
        agent_id: Uuid,
        embedding: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<RetrievedChunk>, RagError>;

    /// Remove every chunk of the agent
    async fn delete(&self, agent_id: Uuid) -> Result<(), RagError>;

    /// Remove the chunks of one document
    async fn delete_document(&self, agent_id: Uuid, document_id: Uuid) -> Result<(), RagError>;

    /// Layout name for logs
    fn name(&self) -> &str;
}

/// A vector keyed by chunk id, filterable by agent and document
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPoint {
    pub chunk_id: Uuid,
    pub agent_id: Uuid,
    pub document_id: Uuid,
    pub vector: Vec<f32>,
}

impl IndexPoint {
    pub fn from_chunk(chunk: &DocumentChunk) -> Self {
        Self {
            chunk_id: chunk.id,
            agent_id: chunk.agent_id,
            document_id: chunk.document_id,
            vector: chunk.embedding.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    pub chunk_id: Uuid,
    pub score: f32,
}

/// External nearest-neighbour index used by the split layout
#[async_trait]
pub trait VectorIndex: Send + Sync + 'static {
    async fn upsert(&self, point: IndexPoint) -> Result<(), RagError>;

    /// Hits with `score > threshold` for `agent_id`, best first
    async fn query(
        &self,
        agent_id: Uuid,
        vector: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<IndexHit>, RagError>;

    async fn delete_agent(&self, agent_id: Uuid) -> Result<(), RagError>;

    async fn delete_document(&self, agent_id: Uuid, document_id: Uuid) -> Result<(), RagError>;

    fn name(&self) -> &str;
}

/// Build the configured layout over `chunks`
///
/// For the split layout with Qdrant this connects and ensures the
/// collection exists.
pub async fn build_vector_store(
    settings: &VectorStoreSettings,
    dimension: usize,
    chunks: Arc<dyn ChunkRepository>,
) -> Result<Arc<dyn VectorStore>, RagError> {
    let store: Arc<dyn VectorStore> = match settings.layout {
        VectorStoreLayout::Unified => Arc::new(UnifiedVectorStore::new(chunks)),
        VectorStoreLayout::Split => {
            let index: Arc<dyn VectorIndex> = match settings.index {
                IndexBackend::Qdrant => {
                    let index = QdrantIndex::new(QdrantIndexConfig::from_settings(settings, dimension))?;
                    index.ensure_collection().await?;
                    Arc::new(index)
                }
                IndexBackend::Memory => Arc::new(InMemoryIndex::new()),
            };
            Arc::new(SplitVectorStore::new(chunks, index))
        }
    };

    tracing::info!(layout = store.name(), "Vector store ready");
    Ok(store)
}
