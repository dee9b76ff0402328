//! Relational persistence for the agent knowledge base
//!
//! Provides storage for:
//! - Training documents
//! - Document chunks, with pgvector cosine search for the unified layout
//! - Read-only agent settings
//!
//! Two backends share the repository traits from `knowledge-core`:
//! Postgres (sqlx + pgvector) and an in-process [`MemoryStore`].

pub mod agents;
pub mod chunks;
pub mod client;
pub mod documents;
pub mod error;
pub mod memory;
pub mod schema;

use std::sync::Arc;

use knowledge_config::{PersistenceBackend, PersistenceSettings};
use knowledge_core::{AgentConfigLoader, ChunkRepository, DocumentRepository};

pub use agents::PgAgentConfigLoader;
pub use chunks::PgChunkStore;
pub use client::{PgClient, PgConfig};
pub use documents::PgDocumentStore;
pub use error::PersistenceError;
pub use memory::MemoryStore;

/// Initialize the persistence layer for the configured backend
///
/// # Arguments
/// * `settings` - persistence section of the settings
/// * `dimension` - embedding width, fixes the `vector(N)` column
pub async fn init(
    settings: &PersistenceSettings,
    dimension: usize,
) -> Result<PersistenceLayer, PersistenceError> {
    match settings.backend {
        PersistenceBackend::Postgres => {
            let client = PgClient::connect(PgConfig::from_settings(settings, dimension)).await?;
            if settings.ensure_schema {
                client.ensure_schema().await?;
            }

            Ok(PersistenceLayer {
                documents: Arc::new(PgDocumentStore::new(client.clone())),
                chunks: Arc::new(PgChunkStore::new(client.clone())),
                agents: Arc::new(PgAgentConfigLoader::new(client)),
            })
        }
        PersistenceBackend::Memory => {
            tracing::warn!("Using in-memory persistence; data is lost on restart");
            Ok(PersistenceLayer::in_memory(MemoryStore::new()))
        }
    }
}

/// Combined persistence layer with all repositories
#[derive(Clone)]
pub struct PersistenceLayer {
    pub documents: Arc<dyn DocumentRepository>,
    pub chunks: Arc<dyn ChunkRepository>,
    pub agents: Arc<dyn AgentConfigLoader>,
}

impl PersistenceLayer {
    pub fn in_memory(store: MemoryStore) -> Self {
        Self {
            documents: Arc::new(store.clone()),
            chunks: Arc::new(store.clone()),
            agents: Arc::new(store),
        }
    }
}
