//! RAG service
//!
//! Stateless facade over the document repository, content processor and
//! vector store. Every call is independent; nothing is retried or rolled
//! back, so a failed ingest leaves its document unprocessed.

use std::sync::Arc;

use chrono::Utc;
use knowledge_config::RagSettings;
use knowledge_core::{
    DocumentChunk, DocumentRepository, DocumentType, Error, RagQuery, RagResponse, Result,
    TrainingDocument, DEFAULT_THRESHOLD, DEFAULT_TOP_K,
};
use uuid::Uuid;

use crate::processor::ContentProcessor;
use crate::vector_store::VectorStore;

/// Values substituted for zero `top_k` / `threshold` in a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryDefaults {
    pub top_k: usize,
    pub threshold: f32,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl QueryDefaults {
    pub fn from_settings(settings: &RagSettings) -> Self {
        Self {
            top_k: settings.default_top_k,
            threshold: settings.default_threshold,
        }
    }
}

/// Result of a successful ingest
#[derive(Debug, Clone)]
pub struct IngestedDocument {
    /// The stored document, with `processed_at` set
    pub document: TrainingDocument,
    pub chunk_count: usize,
}

pub struct RagService {
    documents: Arc<dyn DocumentRepository>,
    processor: ContentProcessor,
    store: Arc<dyn VectorStore>,
    defaults: QueryDefaults,
}

fn require_agent(agent_id: Uuid) -> Result<()> {
    if agent_id.is_nil() {
        return Err(Error::Validation("agent id is required".to_string()));
    }
    Ok(())
}

fn record_ingest_failure(err: &Error) {
    metrics::counter!("rag_ingest_failures_total", "kind" => err.kind()).increment(1);
}

impl RagService {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        processor: ContentProcessor,
        store: Arc<dyn VectorStore>,
        defaults: QueryDefaults,
    ) -> Self {
        Self {
            documents,
            processor,
            store,
            defaults,
        }
    }

    pub fn processor(&self) -> &ContentProcessor {
        &self.processor
    }

    /// Ingest already-extracted text
    #[tracing::instrument(skip(self, title, content, source_url), fields(agent_id = %agent_id, document_type = %document_type))]
    pub async fn process_document(
        &self,
        agent_id: Uuid,
        title: &str,
        document_type: DocumentType,
        content: &str,
        source_url: Option<String>,
    ) -> Result<IngestedDocument> {
        require_agent(agent_id)?;

        let result = self
            .ingest(agent_id, title, document_type, content, source_url)
            .await;
        if let Err(e) = &result {
            record_ingest_failure(e);
            tracing::warn!(error = %e, "Document ingest failed");
        }
        result
    }

    /// Convert media to text, then ingest it like [`Self::process_document`]
    ///
    /// An image with no bytes but a source URL is described by URL.
    #[tracing::instrument(skip(self, title, data, source_url), fields(agent_id = %agent_id, document_type = %document_type, bytes = data.len()))]
    pub async fn process_media_file(
        &self,
        agent_id: Uuid,
        title: &str,
        document_type: DocumentType,
        data: &[u8],
        mime_type: &str,
        source_url: Option<String>,
    ) -> Result<IngestedDocument> {
        require_agent(agent_id)?;

        let converted = match (&source_url, document_type) {
            (Some(url), DocumentType::Image) if data.is_empty() => {
                self.processor.image_url_to_text(url).await
            }
            _ => {
                self.processor
                    .media_to_text(data, document_type, mime_type)
                    .await
            }
        };

        let text = match converted {
            Ok(text) => text,
            Err(e) => {
                let err = Error::from(e);
                record_ingest_failure(&err);
                tracing::warn!(error = %err, "Media conversion failed");
                return Err(err);
            }
        };

        tracing::debug!(chars = text.chars().count(), "Media converted to text");
        self.process_document(agent_id, title, document_type, &text, source_url)
            .await
    }

    async fn ingest(
        &self,
        agent_id: Uuid,
        title: &str,
        document_type: DocumentType,
        content: &str,
        source_url: Option<String>,
    ) -> Result<IngestedDocument> {
        let mut document = TrainingDocument::new(agent_id, title, document_type, source_url);
        self.documents.create_document(&document).await?;

        let chunks = self.processor.process(&document, content).await?;
        let chunk_count = chunks.len();

        for chunk in chunks {
            let chunk = assign_identity(chunk);
            self.store.store(&chunk).await?;
        }

        document.mark_processed();
        self.documents.update_document(&document).await?;

        metrics::counter!("rag_documents_ingested_total", "document_type" => document_type.as_str())
            .increment(1);
        metrics::counter!("rag_chunks_stored_total").increment(chunk_count as u64);
        tracing::info!(document_id = %document.id, chunks = chunk_count, "Document processed");

        Ok(IngestedDocument {
            document,
            chunk_count,
        })
    }

    /// Retrieve context for a question
    #[tracing::instrument(skip(self, query), fields(agent_id = %query.agent_id))]
    pub async fn query(&self, query: RagQuery) -> Result<RagResponse> {
        require_agent(query.agent_id)?;
        if query.query.trim().is_empty() {
            return Err(Error::Validation("query text is empty".to_string()));
        }

        let top_k = query.top_k_or(self.defaults.top_k);
        let threshold = query.threshold_or(self.defaults.threshold);

        let embedding = self.processor.embedder().embed_query(&query.query).await?;

        // cosine against a zero vector is undefined (pgvector yields NaN)
        let chunks = if embedding.iter().all(|v| *v == 0.0) {
            tracing::debug!("Query embedded to a zero vector, nothing can match");
            Vec::new()
        } else {
            self.store
                .search(query.agent_id, &embedding, top_k, threshold)
                .await?
        };

        metrics::counter!("rag_queries_total").increment(1);
        metrics::histogram!("rag_query_results").record(chunks.len() as f64);
        tracing::debug!(top_k, threshold, results = chunks.len(), "Query answered");

        Ok(RagResponse::from_chunks(query.query, chunks))
    }

    /// Remove every chunk and document of an agent
    #[tracing::instrument(skip(self), fields(agent_id = %agent_id))]
    pub async fn delete_agent_documents(&self, agent_id: Uuid) -> Result<()> {
        require_agent(agent_id)?;

        self.store.delete(agent_id).await?;
        let removed = self.documents.delete_documents_for_agent(agent_id).await?;

        tracing::info!(documents = removed, "Agent knowledge base cleared");
        Ok(())
    }

    /// The agent's documents, newest first
    pub async fn get_agent_documents(&self, agent_id: Uuid) -> Result<Vec<TrainingDocument>> {
        require_agent(agent_id)?;
        self.documents.list_documents(agent_id).await
    }

    /// Remove one document and its chunks
    #[tracing::instrument(skip(self), fields(agent_id = %agent_id, document_id = %document_id))]
    pub async fn delete_document(&self, agent_id: Uuid, document_id: Uuid) -> Result<()> {
        require_agent(agent_id)?;

        if self
            .documents
            .get_document(agent_id, document_id)
            .await?
            .is_none()
        {
            return Err(Error::NotFound(format!("document {}", document_id)));
        }

        self.store.delete_document(agent_id, document_id).await?;
        self.documents.delete_document(agent_id, document_id).await?;

        tracing::info!("Document deleted");
        Ok(())
    }
}

fn assign_identity(mut chunk: DocumentChunk) -> DocumentChunk {
    let now = Utc::now();
    chunk.id = Uuid::new_v4();
    chunk.created_at = now;
    chunk.updated_at = now;
    chunk
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_agent() {
        assert!(matches!(require_agent(Uuid::nil()), Err(Error::Validation(_))));
        assert!(require_agent(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_query_defaults_from_settings() {
        let settings = RagSettings {
            default_top_k: 3,
            default_threshold: 0.5,
            ..RagSettings::default()
        };
        assert_eq!(
            QueryDefaults::from_settings(&settings),
            QueryDefaults { top_k: 3, threshold: 0.5 }
        );
    }

    #[test]
    fn test_assign_identity() {
        let doc = TrainingDocument::new(Uuid::new_v4(), "t", DocumentType::Text, None);
        let chunk = DocumentChunk::for_document(&doc, 0, "x".into(), Default::default(), vec![1.0]);
        assert!(chunk.id.is_nil());
        assert!(!assign_identity(chunk).id.is_nil());
    }
}
