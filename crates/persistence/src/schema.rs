//! Postgres schema creation

use sqlx::PgPool;

use crate::error::PersistenceError;

/// Create the pgvector extension if it doesn't exist
pub async fn create_extension(pool: &PgPool) -> Result<(), PersistenceError> {
    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(pool)
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("Failed to create vector extension: {}", e)))?;
    Ok(())
}

/// Create all required tables
///
/// `dimension` fixes the width of `document_chunks.embedding`.
pub async fn create_tables(pool: &PgPool, dimension: usize) -> Result<(), PersistenceError> {
    let statements = [
        (
            "training_documents",
            r#"
        CREATE TABLE IF NOT EXISTS training_documents (
            id UUID PRIMARY KEY,
            agent_id UUID NOT NULL,
            title TEXT NOT NULL,
            document_type TEXT NOT NULL,
            source_url TEXT,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            processed_at TIMESTAMPTZ
        )"#
            .to_string(),
        ),
        (
            "document_chunks",
            format!(
                r#"
        CREATE TABLE IF NOT EXISTS document_chunks (
            id UUID PRIMARY KEY,
            document_id UUID NOT NULL REFERENCES training_documents(id) ON DELETE CASCADE,
            agent_id UUID NOT NULL,
            content TEXT NOT NULL,
            chunk_index INT NOT NULL,
            metadata JSONB NOT NULL DEFAULT '{{}}',
            embedding vector({}),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
                dimension
            ),
        ),
        (
            "agents",
            r#"
        CREATE TABLE IF NOT EXISTS agents (
            id UUID PRIMARY KEY,
            behavior TEXT NOT NULL DEFAULT '',
            system_instruction TEXT NOT NULL DEFAULT '',
            prompt_template_name TEXT,
            prompt_template TEXT
        )"#
            .to_string(),
        ),
    ];

    for (name, ddl) in statements {
        sqlx::query(&ddl)
            .execute(pool)
            .await
            .map_err(|e| PersistenceError::SchemaError(format!("Failed to create {} table: {}", name, e)))?;
    }

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_training_documents_agent ON training_documents(agent_id, created_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_document_chunks_agent ON document_chunks(agent_id)",
        "CREATE INDEX IF NOT EXISTS idx_document_chunks_document ON document_chunks(document_id, chunk_index)",
    ];

    for ddl in indexes {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| PersistenceError::SchemaError(format!("Failed to create index: {}", e)))?;
    }

    Ok(())
}
