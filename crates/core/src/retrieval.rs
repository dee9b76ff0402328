//! Query and result types for retrieval

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::{metadata_keys, DocumentChunk, DocumentType};

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_THRESHOLD: f32 = 0.7;

/// Separator placed between chunk contents in the assembled context
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// A retrieval request scoped to one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagQuery {
    pub query: String,
    pub agent_id: Uuid,
    /// Zero means the service default ([`DEFAULT_TOP_K`] unless configured)
    #[serde(default)]
    pub top_k: usize,
    /// Zero means the service default ([`DEFAULT_THRESHOLD`] unless configured)
    #[serde(default)]
    pub threshold: f32,
}

impl RagQuery {
    pub fn new(agent_id: Uuid, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            agent_id,
            top_k: 0,
            threshold: 0.0,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// `top_k`, or `default` when the query left it at zero
    pub fn top_k_or(&self, default: usize) -> usize {
        if self.top_k == 0 {
            default
        } else {
            self.top_k
        }
    }

    /// `threshold`, or `default` when the query left it at zero
    pub fn threshold_or(&self, default: f32) -> f32 {
        if self.threshold == 0.0 {
            default
        } else {
            self.threshold
        }
    }
}

/// A chunk returned by a similarity search; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: usize,
    pub content: String,
    pub metadata: HashMap<String, String>,
    /// Cosine similarity, higher is closer
    pub score: f32,
    pub document_type: Option<DocumentType>,
}

impl RetrievedChunk {
    pub fn from_chunk(chunk: DocumentChunk, score: f32) -> Self {
        let document_type = chunk
            .metadata
            .get(metadata_keys::TYPE)
            .and_then(|t| t.parse().ok());
        Self {
            chunk_id: chunk.id,
            document_id: chunk.document_id,
            chunk_index: chunk.chunk_index,
            content: chunk.content,
            metadata: chunk.metadata,
            score,
            document_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagResponse {
    pub context: String,
    pub chunks: Vec<RetrievedChunk>,
    pub query: String,
}

impl RagResponse {
    pub fn from_chunks(query: impl Into<String>, chunks: Vec<RetrievedChunk>) -> Self {
        let context = chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        Self {
            context,
            chunks,
            query: query.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
