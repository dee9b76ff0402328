//! Core types for the agent knowledge base
//!
//! This crate provides foundational types used across all other crates:
//! - Training documents, chunks and retrieval types
//! - Agent settings and prompt templates
//! - Repository and loader traits for pluggable storage backends
//! - The shared error taxonomy

pub mod agent;
pub mod document;
pub mod error;
pub mod retrieval;
pub mod similarity;
pub mod traits;

pub use agent::{AgentSettings, PromptTemplate};
pub use document::{metadata_keys, DocumentChunk, DocumentType, TrainingDocument};
pub use error::{Error, Result};
pub use retrieval::{RagQuery, RagResponse, RetrievedChunk, DEFAULT_THRESHOLD, DEFAULT_TOP_K};
pub use similarity::{cosine_similarity, normalize};

pub use traits::{AgentConfigLoader, ChunkRepository, DocumentRepository};
