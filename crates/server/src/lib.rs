//! Knowledge base serving host
//!
//! Wires the configured persistence backend, embedder, media converter
//! chain and vector store into a [`RagService`](knowledge_rag::RagService),
//! and resolves chat context for agents through a TTL settings cache.

pub mod state;
pub mod telemetry;

pub use state::{AppState, ChatContext};
pub use telemetry::{init_metrics, init_tracing};
