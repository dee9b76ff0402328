//! Document Chunking
//!
//! Splits extracted text into retrieval units, per document type:
//!
//! - text: word packing up to `text_chars`
//! - pdf: word packing up to `pdf_chars`
//! - audio / video transcripts: word packing up to `transcript_chars`
//! - faq: one chunk per blank-line separated Q/A block
//! - image: the whole description as a single chunk
//!
//! Word packing never splits a word; a word longer than the target becomes
//! its own chunk.

use std::collections::HashMap;

use knowledge_config::constants::chunking;
use knowledge_config::ChunkingSettings;
use knowledge_core::{metadata_keys, DocumentType, TrainingDocument};

/// Target chunk sizes in characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkerConfig {
    pub text_chars: usize,
    pub pdf_chars: usize,
    pub transcript_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            text_chars: chunking::TEXT_CHARS,
            pdf_chars: chunking::PDF_CHARS,
            transcript_chars: chunking::TRANSCRIPT_CHARS,
        }
    }
}

impl ChunkerConfig {
    pub fn from_settings(settings: &ChunkingSettings) -> Self {
        Self {
            text_chars: settings.text_chars,
            pdf_chars: settings.pdf_chars,
            transcript_chars: settings.transcript_chars,
        }
    }

    /// Packing target for word-packed types; `None` for FAQ and image
    pub fn target_for(&self, document_type: DocumentType) -> Option<usize> {
        match document_type {
            DocumentType::Text => Some(self.text_chars),
            DocumentType::Pdf => Some(self.pdf_chars),
            DocumentType::Audio | DocumentType::Video => Some(self.transcript_chars),
            DocumentType::Faq | DocumentType::Image => None,
        }
    }
}

/// Document-type aware chunker
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Split `text` into ordered, non-empty chunks
    pub fn chunk(&self, text: &str, document_type: DocumentType) -> Vec<String> {
        match document_type {
            DocumentType::Faq => split_faq(text),
            DocumentType::Image => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Vec::new()
                } else {
                    vec![trimmed.to_string()]
                }
            }
            other => {
                let target = self.config.target_for(other).unwrap_or(self.config.text_chars);
                pack_words(text, target)
            }
        }
    }

    /// Metadata attached to every chunk of `document`
    ///
    /// Always `type` and `title`; `source` for media documents that carry
    /// a source URL.
    pub fn chunk_metadata(document: &TrainingDocument) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        metadata.insert(
            metadata_keys::TYPE.to_string(),
            document.document_type.as_str().to_string(),
        );
        metadata.insert(metadata_keys::TITLE.to_string(), document.title.clone());

        if document.document_type.is_media() {
            if let Some(url) = &document.source_url {
                metadata.insert(metadata_keys::SOURCE.to_string(), url.clone());
            }
        }

        metadata
    }
}

/// Greedy word packing; chunk length counts characters, not bytes
fn pack_words(text: &str, target: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if current_len > 0 && current_len + 1 + word_len > target {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

fn split_faq(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(str::to_string)
        .collect()
}
