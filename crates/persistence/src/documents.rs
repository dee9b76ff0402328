//! Training document persistence using Postgres

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use knowledge_core::{DocumentRepository, DocumentType, TrainingDocument};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{PersistenceError, PgClient};

const DOCUMENT_COLUMNS: &str = "id, agent_id, title, document_type, source_url, is_active, \
                                created_at, updated_at, processed_at";

/// Postgres implementation of [`DocumentRepository`]
#[derive(Clone)]
pub struct PgDocumentStore {
    client: PgClient,
}

impl PgDocumentStore {
    pub fn new(client: PgClient) -> Self {
        Self { client }
    }

    pub async fn create(&self, document: &TrainingDocument) -> Result<(), PersistenceError> {
        sqlx::query(
            "INSERT INTO training_documents (
                id, agent_id, title, document_type, source_url, is_active,
                created_at, updated_at, processed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(document.id)
        .bind(document.agent_id)
        .bind(&document.title)
        .bind(document.document_type.as_str())
        .bind(&document.source_url)
        .bind(document.is_active)
        .bind(document.created_at)
        .bind(document.updated_at)
        .bind(document.processed_at)
        .execute(self.client.pool())
        .await?;

        tracing::info!(
            document_id = %document.id,
            agent_id = %document.agent_id,
            document_type = %document.document_type,
            "Training document created"
        );

        Ok(())
    }

    pub async fn update(&self, document: &TrainingDocument) -> Result<(), PersistenceError> {
        sqlx::query(
            "UPDATE training_documents
             SET title = $3, source_url = $4, is_active = $5, updated_at = $6, processed_at = $7
             WHERE id = $1 AND agent_id = $2",
        )
        .bind(document.id)
        .bind(document.agent_id)
        .bind(&document.title)
        .bind(&document.source_url)
        .bind(document.is_active)
        .bind(document.updated_at)
        .bind(document.processed_at)
        .execute(self.client.pool())
        .await?;

        Ok(())
    }

    pub async fn get(
        &self,
        agent_id: Uuid,
        document_id: Uuid,
    ) -> Result<Option<TrainingDocument>, PersistenceError> {
        let query = format!(
            "SELECT {} FROM training_documents WHERE id = $1 AND agent_id = $2",
            DOCUMENT_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(document_id)
            .bind(agent_id)
            .fetch_optional(self.client.pool())
            .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    pub async fn list(&self, agent_id: Uuid) -> Result<Vec<TrainingDocument>, PersistenceError> {
        let query = format!(
            "SELECT {} FROM training_documents WHERE agent_id = $1 ORDER BY created_at DESC",
            DOCUMENT_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(agent_id)
            .fetch_all(self.client.pool())
            .await?;

        rows.iter().map(row_to_document).collect()
    }

    /// Chunk rows go with the document through `ON DELETE CASCADE`
    pub async fn delete(&self, agent_id: Uuid, document_id: Uuid) -> Result<bool, PersistenceError> {
        let result = sqlx::query("DELETE FROM training_documents WHERE id = $1 AND agent_id = $2")
            .bind(document_id)
            .bind(agent_id)
            .execute(self.client.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_for_agent(&self, agent_id: Uuid) -> Result<u64, PersistenceError> {
        let result = sqlx::query("DELETE FROM training_documents WHERE agent_id = $1")
            .bind(agent_id)
            .execute(self.client.pool())
            .await?;

        tracing::info!(agent_id = %agent_id, deleted = result.rows_affected(), "Agent documents deleted");

        Ok(result.rows_affected())
    }
}

fn row_to_document(row: &PgRow) -> Result<TrainingDocument, PersistenceError> {
    let type_name: String = row.try_get("document_type")?;
    let document_type: DocumentType = type_name
        .parse()
        .map_err(|_| PersistenceError::InvalidData(format!("unknown document_type '{}'", type_name)))?;

    Ok(TrainingDocument {
        id: row.try_get("id")?,
        agent_id: row.try_get("agent_id")?,
        title: row.try_get("title")?,
        document_type,
        source_url: row.try_get("source_url")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        processed_at: row.try_get::<Option<DateTime<Utc>>, _>("processed_at")?,
    })
}

#[async_trait]
impl DocumentRepository for PgDocumentStore {
    async fn create_document(&self, document: &TrainingDocument) -> knowledge_core::Result<()> {
        Ok(self.create(document).await?)
    }

    async fn update_document(&self, document: &TrainingDocument) -> knowledge_core::Result<()> {
        Ok(self.update(document).await?)
    }

    async fn get_document(
        &self,
        agent_id: Uuid,
        document_id: Uuid,
    ) -> knowledge_core::Result<Option<TrainingDocument>> {
        Ok(self.get(agent_id, document_id).await?)
    }

    async fn list_documents(&self, agent_id: Uuid) -> knowledge_core::Result<Vec<TrainingDocument>> {
        Ok(self.list(agent_id).await?)
    }

    async fn delete_document(&self, agent_id: Uuid, document_id: Uuid) -> knowledge_core::Result<bool> {
        Ok(self.delete(agent_id, document_id).await?)
    }

    async fn delete_documents_for_agent(&self, agent_id: Uuid) -> knowledge_core::Result<u64> {
        Ok(self.delete_for_agent(agent_id).await?)
    }
}
