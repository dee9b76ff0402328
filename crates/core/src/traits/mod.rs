//! Storage and loader traits
//!
//! ```text
//! Relational store:
//!   - DocumentRepository: TrainingDocument CRUD scoped by agent
//!   - ChunkRepository: chunk rows, cosine search over stored embeddings
//!
//! Agent configuration:
//!   - AgentConfigLoader: read-only agent settings lookup
//! ```

mod agent_loader;
mod repository;

pub use agent_loader::AgentConfigLoader;
pub use repository::{ChunkRepository, DocumentRepository};
