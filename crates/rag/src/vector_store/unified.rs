use std::sync::Arc;

use async_trait::async_trait;
use knowledge_core::{ChunkRepository, DocumentChunk, RetrievedChunk};
use uuid::Uuid;

use super::VectorStore;
use crate::RagError;

/// Embeddings stored on the chunk rows; search runs in the relational store
pub struct UnifiedVectorStore {
    chunks: Arc<dyn ChunkRepository>,
}

impl UnifiedVectorStore {
    pub fn new(chunks: Arc<dyn ChunkRepository>) -> Self {
        Self { chunks }
    }
}

#[async_trait]
impl VectorStore for UnifiedVectorStore {
    async fn store(&self, chunk: &DocumentChunk) -> Result<(), RagError> {
        if chunk.embedding.is_empty() {
            return Err(RagError::Validation(format!("chunk {} has no embedding", chunk.id)));
        }
        self.chunks.upsert_chunk(chunk, true).await?;
        Ok(())
    }

    async fn search(
        &self,
        agent_id: Uuid,
        embedding: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<RetrievedChunk>, RagError> {
        let rows = self
            .chunks
            .similarity_search(agent_id, embedding, top_k, threshold)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(chunk, score)| RetrievedChunk::from_chunk(chunk, score))
            .collect())
    }

    async fn delete(&self, agent_id: Uuid) -> Result<(), RagError> {
        let removed = self.chunks.delete_chunks_for_agent(agent_id).await?;
        tracing::debug!(agent_id = %agent_id, removed, "Deleted agent chunks");
        Ok(())
    }

    async fn delete_document(&self, agent_id: Uuid, document_id: Uuid) -> Result<(), RagError> {
        self.chunks
            .delete_chunks_for_document(agent_id, document_id)
            .await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "unified"
    }
}
