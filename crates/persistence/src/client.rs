//! Postgres client and connection management

use knowledge_config::PersistenceSettings;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::PersistenceError;
use crate::schema;

/// Postgres configuration
#[derive(Debug, Clone)]
pub struct PgConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Width of the chunk embedding column
    pub dimension: usize,
}

impl PgConfig {
    pub fn from_settings(settings: &PersistenceSettings, dimension: usize) -> Self {
        Self {
            database_url: settings.database_url.clone(),
            max_connections: settings.max_connections,
            dimension,
        }
    }
}

/// Postgres pool wrapper
#[derive(Clone)]
pub struct PgClient {
    pool: PgPool,
    config: PgConfig,
}

impl PgClient {
    /// Connect to Postgres
    pub async fn connect(config: PgConfig) -> Result<Self, PersistenceError> {
        tracing::info!(max_connections = config.max_connections, "Connecting to Postgres");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool, config })
    }

    /// Ensure the vector extension, tables and indexes exist
    pub async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        schema::create_extension(&self.pool).await?;
        schema::create_tables(&self.pool, self.config.dimension).await?;
        tracing::info!(dimension = self.config.dimension, "Schema ensured");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
