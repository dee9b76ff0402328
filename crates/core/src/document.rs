//! Training documents and their chunks

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Metadata keys attached to every chunk
pub mod metadata_keys {
    pub const TYPE: &str = "type";
    pub const TITLE: &str = "title";
    pub const SOURCE: &str = "source";
}

/// Kind of source artifact a document was ingested from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Text,
    Pdf,
    Faq,
    Audio,
    Video,
    Image,
}

impl DocumentType {
    pub const ALL: [DocumentType; 6] = [
        Self::Text,
        Self::Pdf,
        Self::Faq,
        Self::Audio,
        Self::Video,
        Self::Image,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Pdf => "pdf",
            Self::Faq => "faq",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Image => "image",
        }
    }

    /// Media types need a converter before they can be chunked
    pub fn is_media(&self) -> bool {
        matches!(self, Self::Pdf | Self::Audio | Self::Video | Self::Image)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "pdf" => Ok(Self::Pdf),
            "faq" => Ok(Self::Faq),
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            "image" => Ok(Self::Image),
            other => Err(Error::Validation(format!(
                "unsupported document type: {}",
                other
            ))),
        }
    }
}

/// One logical source artifact owned by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingDocument {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub title: String,
    pub document_type: DocumentType,
    pub source_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set once every chunk has been stored
    pub processed_at: Option<DateTime<Utc>>,
}

impl TrainingDocument {
    pub fn new(
        agent_id: Uuid,
        title: impl Into<String>,
        document_type: DocumentType,
        source_url: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            agent_id,
            title: title.into(),
            document_type,
            source_url: source_url.filter(|s| !s.trim().is_empty()),
            is_active: true,
            created_at: now,
            updated_at: now,
            processed_at: None,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }

    pub fn mark_processed(&mut self) {
        let now = Utc::now();
        self.processed_at = Some(now);
        self.updated_at = now;
    }
}

/// One retrieval unit, owned by its document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub agent_id: Uuid,
    pub content: String,
    pub chunk_index: usize,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentChunk {
    /// Build an unsaved chunk for `document`; ids and timestamps are
    /// reassigned by the service before storage.
    pub fn for_document(
        document: &TrainingDocument,
        chunk_index: usize,
        content: String,
        metadata: HashMap<String, String>,
        embedding: Vec<f32>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::nil(),
            document_id: document.id,
            agent_id: document.agent_id,
            content,
            chunk_index,
            metadata,
            embedding,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn document_type(&self) -> Option<DocumentType> {
        self.metadata
            .get(metadata_keys::TYPE)
            .and_then(|t| t.parse().ok())
    }
}
