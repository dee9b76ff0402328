//! Error taxonomy shared by every crate in the workspace
//!
//! Crate-local errors (`RagError`, `MediaError`, `PersistenceError`, ...)
//! convert into [`Error`] so callers at the service boundary only ever see
//! one of these categories.

use thiserror::Error;

/// Workspace-wide error
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing input (nil agent id, unsupported document type)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced document or chunk is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Embedding API, media backend or vector index failure
    #[error("{service} error: {message}")]
    External { service: String, message: String },

    /// Relational or vector-index read/write failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Missing or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation not offered by the selected backend
    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl Error {
    pub fn external(service: impl Into<String>, message: impl ToString) -> Self {
        Self::External {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    /// Stable category name, used as a metrics label and in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::External { .. } => "external",
            Self::Storage(_) => "storage",
            Self::Config(_) => "config",
            Self::NotSupported(_) => "not_supported",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_display_names_service() {
        let err = Error::external("embedding", "429 Too Many Requests");
        assert_eq!(err.to_string(), "embedding error: 429 Too Many Requests");
        assert_eq!(err.kind(), "external");
    }
}
