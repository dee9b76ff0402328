use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use knowledge_core::{ChunkRepository, DocumentChunk, RetrievedChunk};
use uuid::Uuid;

use super::{IndexPoint, VectorIndex, VectorStore};
use crate::RagError;

/// Vectors in an external index, chunk rows without embeddings
///
/// Writes are not transactional across the two stores. A row without a
/// vector is never returned; a vector without a row is dropped at read time,
/// as is a vector whose document has been deactivated.
pub struct SplitVectorStore {
    chunks: Arc<dyn ChunkRepository>,
    index: Arc<dyn VectorIndex>,
}

impl SplitVectorStore {
    pub fn new(chunks: Arc<dyn ChunkRepository>, index: Arc<dyn VectorIndex>) -> Self {
        Self { chunks, index }
    }
}

/// Run both deletes, report the first failure
fn first_error(
    rows: Result<(), RagError>,
    vectors: Result<(), RagError>,
) -> Result<(), RagError> {
    match (rows, vectors) {
        (Err(e), other) => {
            if let Err(second) = other {
                tracing::warn!(error = %second, "Index delete also failed");
            }
            Err(e)
        }
        (Ok(()), result) => result,
    }
}

#[async_trait]
impl VectorStore for SplitVectorStore {
    async fn store(&self, chunk: &DocumentChunk) -> Result<(), RagError> {
        if chunk.embedding.is_empty() {
            return Err(RagError::Validation(format!("chunk {} has no embedding", chunk.id)));
        }
        self.chunks.upsert_chunk(chunk, false).await?;
        self.index.upsert(IndexPoint::from_chunk(chunk)).await
    }

    async fn search(
        &self,
        agent_id: Uuid,
        embedding: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<RetrievedChunk>, RagError> {
        let hits = self.index.query(agent_id, embedding, top_k, threshold).await?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = hits.iter().map(|h| h.chunk_id).collect();
        let mut rows: HashMap<Uuid, DocumentChunk> = self
            .chunks
            .get_chunks(agent_id, &ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let results: Vec<RetrievedChunk> = hits
            .iter()
            .filter_map(|hit| {
                rows.remove(&hit.chunk_id)
                    .map(|chunk| RetrievedChunk::from_chunk(chunk, hit.score))
            })
            .collect();

        if results.len() < hits.len() {
            tracing::debug!(
                agent_id = %agent_id,
                dropped = hits.len() - results.len(),
                "Index hits without chunk rows"
            );
        }

        Ok(results)
    }

    async fn delete(&self, agent_id: Uuid) -> Result<(), RagError> {
        let rows = self
            .chunks
            .delete_chunks_for_agent(agent_id)
            .await
            .map(|_| ())
            .map_err(RagError::from);
        let vectors = self.index.delete_agent(agent_id).await;
        first_error(rows, vectors)
    }

    async fn delete_document(&self, agent_id: Uuid, document_id: Uuid) -> Result<(), RagError> {
        let rows = self
            .chunks
            .delete_chunks_for_document(agent_id, document_id)
            .await
            .map(|_| ())
            .map_err(RagError::from);
        let vectors = self.index.delete_document(agent_id, document_id).await;
        first_error(rows, vectors)
    }

    fn name(&self) -> &str {
        "split"
    }
}
