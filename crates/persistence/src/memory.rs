//! In-process store with the same semantics as the Postgres tables
//!
//! Used by the `memory` persistence backend and by tests. Mirrors the
//! foreign key (chunks need a parent document), the cascade on document
//! delete and the `is_active` join in chunk reads and similarity search.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use knowledge_core::{
    cosine_similarity, AgentConfigLoader, AgentSettings, ChunkRepository, DocumentChunk,
    DocumentRepository, TrainingDocument,
};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::PersistenceError;

#[derive(Default)]
struct Tables {
    documents: HashMap<Uuid, TrainingDocument>,
    chunks: HashMap<Uuid, DocumentChunk>,
    agents: HashMap<Uuid, AgentSettings>,
}

/// Shared in-memory tables; clones see the same data
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace an agent's settings
    pub fn insert_agent(&self, settings: AgentSettings) {
        self.tables.write().agents.insert(settings.agent_id, settings);
    }

    pub fn document_count(&self) -> usize {
        self.tables.read().documents.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.tables.read().chunks.len()
    }

    /// Chunks of one document in index order
    pub fn chunks_for_document(&self, document_id: Uuid) -> Vec<DocumentChunk> {
        let tables = self.tables.read();
        let mut chunks: Vec<DocumentChunk> = tables
            .chunks
            .values()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        chunks
    }
}

#[async_trait]
impl DocumentRepository for MemoryStore {
    async fn create_document(&self, document: &TrainingDocument) -> knowledge_core::Result<()> {
        let mut tables = self.tables.write();
        if tables.documents.contains_key(&document.id) {
            return Err(PersistenceError::InvalidData(format!(
                "document {} already exists",
                document.id
            ))
            .into());
        }
        tables.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn update_document(&self, document: &TrainingDocument) -> knowledge_core::Result<()> {
        let mut tables = self.tables.write();
        if let Some(existing) = tables.documents.get_mut(&document.id) {
            if existing.agent_id == document.agent_id {
                existing.title = document.title.clone();
                existing.source_url = document.source_url.clone();
                existing.is_active = document.is_active;
                existing.updated_at = document.updated_at;
                existing.processed_at = document.processed_at;
            }
        }
        Ok(())
    }

    async fn get_document(
        &self,
        agent_id: Uuid,
        document_id: Uuid,
    ) -> knowledge_core::Result<Option<TrainingDocument>> {
        Ok(self
            .tables
            .read()
            .documents
            .get(&document_id)
            .filter(|d| d.agent_id == agent_id)
            .cloned())
    }

    async fn list_documents(&self, agent_id: Uuid) -> knowledge_core::Result<Vec<TrainingDocument>> {
        let mut docs: Vec<TrainingDocument> = self
            .tables
            .read()
            .documents
            .values()
            .filter(|d| d.agent_id == agent_id)
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(docs)
    }

    async fn delete_document(&self, agent_id: Uuid, document_id: Uuid) -> knowledge_core::Result<bool> {
        let mut tables = self.tables.write();
        let owned = tables
            .documents
            .get(&document_id)
            .is_some_and(|d| d.agent_id == agent_id);
        if !owned {
            return Ok(false);
        }
        tables.documents.remove(&document_id);
        tables.chunks.retain(|_, c| c.document_id != document_id);
        Ok(true)
    }

    async fn delete_documents_for_agent(&self, agent_id: Uuid) -> knowledge_core::Result<u64> {
        let mut tables = self.tables.write();
        let before = tables.documents.len();
        tables.documents.retain(|_, d| d.agent_id != agent_id);
        let removed = (before - tables.documents.len()) as u64;

        let Tables { documents, chunks, .. } = &mut *tables;
        chunks.retain(|_, c| documents.contains_key(&c.document_id));

        Ok(removed)
    }
}

#[async_trait]
impl ChunkRepository for MemoryStore {
    async fn upsert_chunk(&self, chunk: &DocumentChunk, include_embedding: bool) -> knowledge_core::Result<()> {
        let mut tables = self.tables.write();
        if !tables.documents.contains_key(&chunk.document_id) {
            return Err(PersistenceError::ForeignKey(format!(
                "chunk {} references missing document {}",
                chunk.id, chunk.document_id
            ))
            .into());
        }

        let mut row = chunk.clone();
        if !include_embedding {
            row.embedding.clear();
        }
        tables.chunks.insert(row.id, row);
        Ok(())
    }

    async fn get_chunks(&self, agent_id: Uuid, ids: &[Uuid]) -> knowledge_core::Result<Vec<DocumentChunk>> {
        let tables = self.tables.read();
        Ok(ids
            .iter()
            .filter_map(|id| tables.chunks.get(id))
            .filter(|c| c.agent_id == agent_id)
            .filter(|c| {
                tables
                    .documents
                    .get(&c.document_id)
                    .is_some_and(|d| d.is_active)
            })
            .cloned()
            .collect())
    }

    async fn similarity_search(
        &self,
        agent_id: Uuid,
        embedding: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> knowledge_core::Result<Vec<(DocumentChunk, f32)>> {
        let tables = self.tables.read();

        let mut scored: Vec<(DocumentChunk, f32)> = tables
            .chunks
            .values()
            .filter(|c| c.agent_id == agent_id && !c.embedding.is_empty())
            .filter(|c| {
                tables
                    .documents
                    .get(&c.document_id)
                    .is_some_and(|d| d.is_active)
            })
            .map(|c| (c.clone(), cosine_similarity(&c.embedding, embedding)))
            .filter(|(_, score)| *score > threshold)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete_chunks_for_agent(&self, agent_id: Uuid) -> knowledge_core::Result<u64> {
        let mut tables = self.tables.write();
        let before = tables.chunks.len();
        tables.chunks.retain(|_, c| c.agent_id != agent_id);
        Ok((before - tables.chunks.len()) as u64)
    }

    async fn delete_chunks_for_document(&self, agent_id: Uuid, document_id: Uuid) -> knowledge_core::Result<u64> {
        let mut tables = self.tables.write();
        let before = tables.chunks.len();
        tables
            .chunks
            .retain(|_, c| !(c.agent_id == agent_id && c.document_id == document_id));
        Ok((before - tables.chunks.len()) as u64)
    }
}

#[async_trait]
impl AgentConfigLoader for MemoryStore {
    async fn load_agent(&self, agent_id: Uuid) -> knowledge_core::Result<Option<AgentSettings>> {
        Ok(self.tables.read().agents.get(&agent_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_core::DocumentType;

    fn chunk(doc: &TrainingDocument, index: usize, embedding: Vec<f32>) -> DocumentChunk {
        let mut c = DocumentChunk::for_document(doc, index, format!("chunk {}", index), HashMap::new(), embedding);
        c.id = Uuid::new_v4();
        c
    }

    #[tokio::test]
    async fn test_chunk_requires_parent_document() {
        let store = MemoryStore::new();
        let doc = TrainingDocument::new(Uuid::new_v4(), "orphan", DocumentType::Text, None);

        let err = store.upsert_chunk(&chunk(&doc, 0, vec![1.0]), true).await.unwrap_err();
        assert!(matches!(err, knowledge_core::Error::Storage(_)));
    }

    #[tokio::test]
    async fn test_search_skips_inactive_documents_and_respects_threshold() {
        let store = MemoryStore::new();
        let agent = Uuid::new_v4();

        let active = TrainingDocument::new(agent, "active", DocumentType::Text, None);
        let mut inactive = TrainingDocument::new(agent, "inactive", DocumentType::Text, None);
        inactive.is_active = false;
        store.create_document(&active).await.unwrap();
        store.create_document(&inactive).await.unwrap();

        store.upsert_chunk(&chunk(&active, 0, vec![1.0, 0.0]), true).await.unwrap();
        store.upsert_chunk(&chunk(&active, 1, vec![0.6, 0.8]), true).await.unwrap();
        store.upsert_chunk(&chunk(&inactive, 0, vec![1.0, 0.0]), true).await.unwrap();

        let hits = store.similarity_search(agent, &[1.0, 0.0], 10, 0.5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.document_id, active.id);
        assert!(hits[0].1 > hits[1].1);

        // strictly greater than the threshold
        let hits = store.similarity_search(agent, &[1.0, 0.0], 10, 0.6).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_get_chunks_skips_inactive_documents() {
        let store = MemoryStore::new();
        let agent = Uuid::new_v4();
        let mut doc = TrainingDocument::new(agent, "retired", DocumentType::Text, None);
        store.create_document(&doc).await.unwrap();
        let c = chunk(&doc, 0, vec![1.0, 0.0]);
        store.upsert_chunk(&c, false).await.unwrap();
        assert_eq!(store.get_chunks(agent, &[c.id]).await.unwrap().len(), 1);

        doc.is_active = false;
        store.update_document(&doc).await.unwrap();
        assert!(store.get_chunks(agent, &[c.id]).await.unwrap().is_empty());
        assert_eq!(store.chunk_count(), 1);
    }

    #[tokio::test]
    async fn test_rows_without_embedding_are_not_searchable() {
        let store = MemoryStore::new();
        let agent = Uuid::new_v4();
        let doc = TrainingDocument::new(agent, "split", DocumentType::Text, None);
        store.create_document(&doc).await.unwrap();

        let c = chunk(&doc, 0, vec![1.0, 0.0]);
        store.upsert_chunk(&c, false).await.unwrap();

        assert!(store.similarity_search(agent, &[1.0, 0.0], 5, 0.0).await.unwrap().is_empty());
        let rows = store.get_chunks(agent, &[c.id]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].embedding.is_empty());
    }

    #[tokio::test]
    async fn test_reads_are_scoped_by_agent() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let doc = TrainingDocument::new(owner, "mine", DocumentType::Faq, None);
        store.create_document(&doc).await.unwrap();
        let c = chunk(&doc, 0, vec![1.0]);
        store.upsert_chunk(&c, true).await.unwrap();

        let other = Uuid::new_v4();
        assert!(store.get_document(other, doc.id).await.unwrap().is_none());
        assert!(store.get_chunks(other, &[c.id]).await.unwrap().is_empty());
        assert!(!store.delete_document(other, doc.id).await.unwrap());
        assert_eq!(store.document_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_document_cascades() {
        let store = MemoryStore::new();
        let agent = Uuid::new_v4();
        let doc = TrainingDocument::new(agent, "doc", DocumentType::Text, None);
        store.create_document(&doc).await.unwrap();
        store.upsert_chunk(&chunk(&doc, 0, vec![1.0]), true).await.unwrap();
        store.upsert_chunk(&chunk(&doc, 1, vec![1.0]), true).await.unwrap();

        assert!(store.delete_document(agent, doc.id).await.unwrap());
        assert_eq!(store.chunk_count(), 0);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = MemoryStore::new();
        let agent = Uuid::new_v4();
        let mut older = TrainingDocument::new(agent, "older", DocumentType::Text, None);
        older.created_at = older.created_at - chrono::Duration::minutes(5);
        let newer = TrainingDocument::new(agent, "newer", DocumentType::Text, None);
        store.create_document(&older).await.unwrap();
        store.create_document(&newer).await.unwrap();

        let titles: Vec<String> = store
            .list_documents(agent)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.title)
            .collect();
        assert_eq!(titles, vec!["newer", "older"]);
    }
}
