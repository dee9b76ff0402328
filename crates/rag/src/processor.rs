//! Content processing
//!
//! Turns raw document content into embedded chunks, and converts binary
//! media into text through the configured converter chain.

use std::sync::Arc;

use knowledge_core::{DocumentChunk, DocumentType, TrainingDocument};
use knowledge_media::MediaToTextConverter;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::chunker::Chunker;
use crate::embeddings::{check_count, EmbedMode, Embedder};
use crate::RagError;

/// Chunk + embed pipeline for one document
pub struct ContentProcessor {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    media: Option<Arc<dyn MediaToTextConverter>>,
}

impl ContentProcessor {
    pub fn new(
        chunker: Chunker,
        embedder: Arc<dyn Embedder>,
        media: Option<Arc<dyn MediaToTextConverter>>,
    ) -> Self {
        Self {
            chunker,
            embedder,
            media,
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn has_media_converter(&self) -> bool {
        self.media.is_some()
    }

    /// Chunk `content` per the document's type and embed every chunk in a
    /// single batch. Chunks come back with nil ids; the caller assigns
    /// identities before storage.
    pub async fn process(
        &self,
        document: &TrainingDocument,
        content: &str,
    ) -> Result<Vec<DocumentChunk>, RagError> {
        let texts = self.chunker.chunk(content, document.document_type);
        if texts.is_empty() {
            tracing::debug!(document_id = %document.id, "Document produced no chunks");
            return Ok(Vec::new());
        }

        let embeddings = self
            .embedder
            .embed(&texts, EmbedMode::SearchDocument)
            .await?;
        let embeddings = check_count(self.embedder.name(), texts.len(), embeddings)?;

        let metadata = Chunker::chunk_metadata(document);
        let chunks = texts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (text, embedding))| {
                DocumentChunk::for_document(document, index, text, metadata.clone(), embedding)
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            document_id = %document.id,
            chunks = chunks.len(),
            "Document chunked and embedded"
        );
        Ok(chunks)
    }

    /// Read media from `reader` and convert it to text
    pub async fn media_to_text<R>(
        &self,
        mut reader: R,
        document_type: DocumentType,
        mime_type: &str,
    ) -> Result<String, RagError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .await
            .map_err(|e| RagError::Validation(format!("failed to read media: {}", e)))?;

        self.media_bytes_to_text(&data, document_type, mime_type).await
    }

    /// Convert in-memory media to text, dispatching on document type
    pub async fn media_bytes_to_text(
        &self,
        data: &[u8],
        document_type: DocumentType,
        mime_type: &str,
    ) -> Result<String, RagError> {
        let converter = self.converter()?;

        let text = match document_type {
            DocumentType::Pdf => converter.pdf_to_text(data).await?,
            DocumentType::Image => converter.image_to_text(data, mime_type).await?,
            DocumentType::Audio => converter.audio_to_text(data, mime_type).await?,
            DocumentType::Video => converter.video_to_text(data, mime_type).await?,
            DocumentType::Text | DocumentType::Faq => {
                return Err(RagError::UnsupportedType(document_type.to_string()))
            }
        };

        Ok(text)
    }

    /// Describe a remote image without downloading it
    pub async fn image_url_to_text(&self, url: &str) -> Result<String, RagError> {
        Ok(self.converter()?.image_url_to_text(url).await?)
    }

    fn converter(&self) -> Result<&Arc<dyn MediaToTextConverter>, RagError> {
        self.media.as_ref().ok_or(RagError::MediaNotConfigured)
    }
}
