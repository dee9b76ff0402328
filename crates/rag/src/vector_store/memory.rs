use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{IndexHit, IndexPoint, VectorIndex};
use crate::RagError;

/// In-process vector index for tests and the memory profile
#[derive(Default)]
pub struct InMemoryIndex {
    points: RwLock<HashMap<Uuid, IndexPoint>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.read().is_empty()
    }

    pub fn count_for_agent(&self, agent_id: Uuid) -> usize {
        self.points
            .read()
            .values()
            .filter(|p| p.agent_id == agent_id)
            .count()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, point: IndexPoint) -> Result<(), RagError> {
        self.points.write().insert(point.chunk_id, point);
        Ok(())
    }

    async fn query(
        &self,
        agent_id: Uuid,
        vector: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<IndexHit>, RagError> {
        let mut hits: Vec<IndexHit> = self
            .points
            .read()
            .values()
            .filter(|p| p.agent_id == agent_id)
            .map(|p| IndexHit {
                chunk_id: p.chunk_id,
                score: knowledge_core::cosine_similarity(vector, &p.vector),
            })
            .filter(|h| h.score > threshold)
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete_agent(&self, agent_id: Uuid) -> Result<(), RagError> {
        self.points.write().retain(|_, p| p.agent_id != agent_id);
        Ok(())
    }

    async fn delete_document(&self, agent_id: Uuid, document_id: Uuid) -> Result<(), RagError> {
        self.points
            .write()
            .retain(|_, p| !(p.agent_id == agent_id && p.document_id == document_id));
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
