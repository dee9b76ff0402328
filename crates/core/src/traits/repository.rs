//! Document and chunk repositories

use async_trait::async_trait;
use uuid::Uuid;

use crate::{DocumentChunk, Result, TrainingDocument};

/// Persistence of [`TrainingDocument`] rows
///
/// Every method is scoped by the owning agent id.
#[async_trait]
pub trait DocumentRepository: Send + Sync + 'static {
    async fn create_document(&self, document: &TrainingDocument) -> Result<()>;

    /// Overwrite mutable fields (title, active flag, timestamps)
    async fn update_document(&self, document: &TrainingDocument) -> Result<()>;

    async fn get_document(
        &self,
        agent_id: Uuid,
        document_id: Uuid,
    ) -> Result<Option<TrainingDocument>>;

    /// All documents of an agent, newest first
    async fn list_documents(&self, agent_id: Uuid) -> Result<Vec<TrainingDocument>>;

    /// Delete one document and, through ownership, its chunk rows.
    /// Returns false if the agent owns no such document.
    async fn delete_document(&self, agent_id: Uuid, document_id: Uuid) -> Result<bool>;

    /// Returns the number of documents removed
    async fn delete_documents_for_agent(&self, agent_id: Uuid) -> Result<u64>;
}

/// Persistence of [`DocumentChunk`] rows
#[async_trait]
pub trait ChunkRepository: Send + Sync + 'static {
    /// Insert or replace a chunk row.
    ///
    /// With `include_embedding = false` the embedding column is left empty,
    /// which is how the split layout keeps vectors out of the relational store.
    async fn upsert_chunk(&self, chunk: &DocumentChunk, include_embedding: bool) -> Result<()>;

    /// Batch fetch by id. Unknown ids, ids owned by another agent and
    /// chunks of inactive documents are skipped; result order is unspecified.
    async fn get_chunks(&self, agent_id: Uuid, ids: &[Uuid]) -> Result<Vec<DocumentChunk>>;

    /// Cosine search over stored embeddings.
    ///
    /// Only chunks whose parent document is active are considered.
    /// Returns `(chunk, similarity)` with `similarity > threshold`, most
    /// similar first, at most `top_k` entries.
    async fn similarity_search(
        &self,
        agent_id: Uuid,
        embedding: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<(DocumentChunk, f32)>>;

    async fn delete_chunks_for_agent(&self, agent_id: Uuid) -> Result<u64>;

    async fn delete_chunks_for_document(&self, agent_id: Uuid, document_id: Uuid) -> Result<u64>;
}
