//! Persistence error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Dangling reference: {0}")]
    ForeignKey(String),
}

impl From<PersistenceError> for knowledge_core::Error {
    fn from(err: PersistenceError) -> Self {
        knowledge_core::Error::Storage(err.to_string())
    }
}
