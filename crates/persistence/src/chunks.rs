//! Chunk persistence and cosine search using Postgres + pgvector
//!
//! Embeddings are bound as `real[]` and cast to `vector` server-side, so no
//! pgvector client type is needed. A zero-norm vector has a NaN cosine
//! distance in pgvector; such rows never match a search.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use knowledge_core::{ChunkRepository, DocumentChunk};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{PersistenceError, PgClient};

/// Postgres implementation of [`ChunkRepository`]
#[derive(Clone)]
pub struct PgChunkStore {
    client: PgClient,
}

impl PgChunkStore {
    pub fn new(client: PgClient) -> Self {
        Self { client }
    }

    pub async fn upsert(
        &self,
        chunk: &DocumentChunk,
        include_embedding: bool,
    ) -> Result<(), PersistenceError> {
        let metadata = serde_json::to_value(&chunk.metadata)?;
        let embedding = (include_embedding && !chunk.embedding.is_empty()).then(|| chunk.embedding.clone());

        sqlx::query(
            "INSERT INTO document_chunks (
                id, document_id, agent_id, content, chunk_index, metadata, embedding,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7::real[]::vector, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                content = EXCLUDED.content,
                chunk_index = EXCLUDED.chunk_index,
                metadata = EXCLUDED.metadata,
                embedding = EXCLUDED.embedding,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(chunk.id)
        .bind(chunk.document_id)
        .bind(chunk.agent_id)
        .bind(&chunk.content)
        .bind(chunk.chunk_index as i32)
        .bind(metadata)
        .bind(embedding)
        .bind(chunk.created_at)
        .bind(chunk.updated_at)
        .execute(self.client.pool())
        .await?;

        Ok(())
    }

    pub async fn get_by_ids(
        &self,
        agent_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<DocumentChunk>, PersistenceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT c.id, c.document_id, c.agent_id, c.content, c.chunk_index, c.metadata,
                    c.embedding::real[] AS embedding, c.created_at, c.updated_at
             FROM document_chunks c
             JOIN training_documents d ON d.id = c.document_id
             WHERE c.agent_id = $1 AND c.id = ANY($2) AND d.is_active",
        )
        .bind(agent_id)
        .bind(ids)
        .fetch_all(self.client.pool())
        .await?;

        rows.iter().map(row_to_chunk).collect()
    }

    pub async fn search(
        &self,
        agent_id: Uuid,
        embedding: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<(DocumentChunk, f32)>, PersistenceError> {
        let rows = sqlx::query(
            "SELECT c.id, c.document_id, c.agent_id, c.content, c.chunk_index, c.metadata,
                    NULL::real[] AS embedding, c.created_at, c.updated_at,
                    1 - (c.embedding <=> $2::real[]::vector) AS similarity
             FROM document_chunks c
             JOIN training_documents d ON d.id = c.document_id
             WHERE c.agent_id = $1
               AND d.is_active
               AND c.embedding IS NOT NULL
               AND (c.embedding <=> $2::real[]::vector) <> 'NaN'::float8
               AND 1 - (c.embedding <=> $2::real[]::vector) > $3
             ORDER BY c.embedding <=> $2::real[]::vector
             LIMIT $4",
        )
        .bind(agent_id)
        .bind(embedding)
        .bind(threshold as f64)
        .bind(top_k as i64)
        .fetch_all(self.client.pool())
        .await?;

        rows.iter()
            .map(|row| {
                let similarity: f64 = row.try_get("similarity")?;
                Ok((row_to_chunk(row)?, similarity as f32))
            })
            .collect()
    }

    pub async fn delete_for_agent(&self, agent_id: Uuid) -> Result<u64, PersistenceError> {
        let result = sqlx::query("DELETE FROM document_chunks WHERE agent_id = $1")
            .bind(agent_id)
            .execute(self.client.pool())
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_for_document(
        &self,
        agent_id: Uuid,
        document_id: Uuid,
    ) -> Result<u64, PersistenceError> {
        let result =
            sqlx::query("DELETE FROM document_chunks WHERE agent_id = $1 AND document_id = $2")
                .bind(agent_id)
                .bind(document_id)
                .execute(self.client.pool())
                .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_chunk(row: &PgRow) -> Result<DocumentChunk, PersistenceError> {
    let metadata: serde_json::Value = row.try_get("metadata")?;
    let metadata: HashMap<String, String> = serde_json::from_value(metadata)?;
    let chunk_index: i32 = row.try_get("chunk_index")?;
    let embedding: Option<Vec<f32>> = row.try_get("embedding")?;

    Ok(DocumentChunk {
        id: row.try_get("id")?,
        document_id: row.try_get("document_id")?,
        agent_id: row.try_get("agent_id")?,
        content: row.try_get("content")?,
        chunk_index: usize::try_from(chunk_index)
            .map_err(|_| PersistenceError::InvalidData(format!("negative chunk_index {}", chunk_index)))?,
        metadata,
        embedding: embedding.unwrap_or_default(),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

#[async_trait]
impl ChunkRepository for PgChunkStore {
    async fn upsert_chunk(&self, chunk: &DocumentChunk, include_embedding: bool) -> knowledge_core::Result<()> {
        Ok(self.upsert(chunk, include_embedding).await?)
    }

    async fn get_chunks(&self, agent_id: Uuid, ids: &[Uuid]) -> knowledge_core::Result<Vec<DocumentChunk>> {
        Ok(self.get_by_ids(agent_id, ids).await?)
    }

    async fn similarity_search(
        &self,
        agent_id: Uuid,
        embedding: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> knowledge_core::Result<Vec<(DocumentChunk, f32)>> {
        Ok(self.search(agent_id, embedding, top_k, threshold).await?)
    }

    async fn delete_chunks_for_agent(&self, agent_id: Uuid) -> knowledge_core::Result<u64> {
        Ok(self.delete_for_agent(agent_id).await?)
    }

    async fn delete_chunks_for_document(&self, agent_id: Uuid, document_id: Uuid) -> knowledge_core::Result<u64> {
        Ok(self.delete_for_document(agent_id, document_id).await?)
    }
}
