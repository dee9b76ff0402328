//! Configuration management for the agent knowledge base
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default.*`, `config/{env}.*`)
//! - Environment variables (`KNOWLEDGE__` prefix, `__` separator)

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, load_settings_from, AgentCacheSettings, ChunkingSettings, CloudMediaSettings,
    EmbeddingProvider, EmbeddingSettings, IndexBackend, LocalMediaSettings, MediaProcessorKind,
    MediaSettings, ObservabilitySettings, PersistenceBackend, PersistenceSettings, RagSettings,
    RuntimeEnvironment, Settings, VectorStoreLayout, VectorStoreSettings, VisionMediaSettings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for knowledge_core::Error {
    fn from(err: ConfigError) -> Self {
        knowledge_core::Error::Config(err.to_string())
    }
}
