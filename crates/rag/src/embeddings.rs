//! Text Embeddings
//!
//! Provider-neutral embedding interface. Documents and queries are embedded
//! in different modes so asymmetric models (Cohere `input_type`, Qwen3
//! instruction prefixes) get the right input.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use knowledge_config::{EmbeddingProvider, EmbeddingSettings};

use crate::cohere_embeddings::{CohereEmbedder, CohereEmbeddingConfig};
use crate::ollama_embeddings::{OllamaEmbedder, OllamaEmbeddingConfig};
use crate::RagError;

/// What the embedded text is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedMode {
    /// Chunk content stored in the knowledge base
    SearchDocument,
    /// User question compared against stored chunks
    SearchQuery,
}

impl EmbedMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchDocument => "search_document",
            Self::SearchQuery => "search_query",
        }
    }
}

/// Produces one vector per input text, in input order
#[async_trait]
pub trait Embedder: Send + Sync + 'static {
    async fn embed(&self, texts: &[String], mode: EmbedMode) -> Result<Vec<Vec<f32>>, RagError>;

    /// Output vector length
    fn dimension(&self) -> usize;

    /// Provider name for logs
    fn name(&self) -> &str;

    /// Embed a single query string
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, RagError> {
        self.embed(&[query.to_string()], EmbedMode::SearchQuery)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("No embedding returned".to_string()))
    }
}

/// Settings shared by the HTTP providers
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub dimension: usize,
    /// Provider-side limit; larger batches are sent anyway, with a warning
    pub max_batch_size: usize,
    pub timeout: Duration,
}

impl EmbeddingConfig {
    pub fn from_settings(settings: &EmbeddingSettings) -> Self {
        Self {
            endpoint: settings.resolved_endpoint(),
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
            model: settings.resolved_model(),
            dimension: settings.dimension,
            max_batch_size: settings.max_batch_size,
            timeout: Duration::from_millis(settings.timeout_ms),
        }
    }
}

pub(crate) fn warn_if_oversized(provider: &str, count: usize, max_batch_size: usize) {
    if max_batch_size > 0 && count > max_batch_size {
        tracing::warn!(
            provider,
            count,
            max_batch_size,
            "Embedding batch exceeds provider limit"
        );
    }
}

/// The provider must answer with exactly one vector per text
pub(crate) fn check_count(
    provider: &str,
    expected: usize,
    embeddings: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>, RagError> {
    if embeddings.len() != expected {
        return Err(RagError::Embedding(format!(
            "{} returned {} embeddings for {} texts",
            provider,
            embeddings.len(),
            expected
        )));
    }
    Ok(embeddings)
}

/// Deterministic offline embedder
///
/// Hashes lower-cased words into buckets and L2-normalizes, so identical
/// texts map to identical vectors and texts sharing words score higher.
/// Used for tests and local development without an embedding API.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let idx = (fnv1a(&word.to_lowercase()) % self.dimension as u64) as usize;
            embedding[idx] += 1.0;
        }

        knowledge_core::normalize(&mut embedding);
        embedding
    }
}

fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in s.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// Build the configured embedding provider
pub fn build_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>, RagError> {
    let config = EmbeddingConfig::from_settings(settings);

    let embedder: Arc<dyn Embedder> = match settings.provider {
        EmbeddingProvider::Cohere => Arc::new(CohereEmbedder::new(CohereEmbeddingConfig {
            base: config,
        })?),
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbedder::new(OllamaEmbeddingConfig {
            base: config,
            query_instruction: settings.query_instruction.clone(),
        })?),
        EmbeddingProvider::Hash => Arc::new(HashEmbedder::new(settings.dimension)),
    };

    tracing::info!(
        provider = embedder.name(),
        dimension = embedder.dimension(),
        "Embedder ready"
    );
    Ok(embedder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_embedder_normalized() {
        let embedder = HashEmbedder::new(64);
        let embedding = embedder.embed_one("Hello world");

        assert_eq!(embedding.len(), 64);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_hash_embedder_word_overlap() {
        let embedder = HashEmbedder::new(256);
        let a = embedder.embed_one("opening hours of the branch");
        let b = embedder.embed_one("Branch opening hours");
        let c = embedder.embed_one("zebra quantum");

        let ab = knowledge_core::cosine_similarity(&a, &b);
        let ac = knowledge_core::cosine_similarity(&a, &c);
        assert!(ab > ac);
        assert!((knowledge_core::cosine_similarity(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(8);
        assert!(embedder.embed_one("  ").iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn test_embed_query_single() {
        let embedder = HashEmbedder::new(32);
        let q = embedder.embed_query("gold rate").await.unwrap();
        assert_eq!(q, embedder.embed_one("gold rate"));
    }

    #[test]
    fn test_check_count() {
        assert!(check_count("p", 2, vec![vec![0.0], vec![1.0]]).is_ok());
        let err = check_count("p", 2, vec![vec![0.0]]).unwrap_err();
        assert!(err.to_string().contains("1 embeddings for 2 texts"));
    }

    #[test]
    fn test_mode_strings() {
        assert_eq!(EmbedMode::SearchDocument.as_str(), "search_document");
        assert_eq!(EmbedMode::SearchQuery.as_str(), "search_query");
    }

    #[test]
    fn test_build_hash_embedder() {
        let settings = EmbeddingSettings {
            provider: EmbeddingProvider::Hash,
            dimension: 16,
            ..EmbeddingSettings::default()
        };
        let embedder = build_embedder(&settings).unwrap();
        assert_eq!(embedder.dimension(), 16);
        assert_eq!(embedder.name(), "hash");
    }
}
