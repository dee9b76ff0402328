//! Ollama Embeddings
//!
//! Uses Ollama's `/api/embed` endpoint, which accepts a batch of inputs.
//!
//! ## Qwen3-Embedding Instruction Format
//!
//! Queries are prefixed with `Instruct: <task>\nQuery:<query>`.
//! Documents are embedded as plain text.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::embeddings::{check_count, warn_if_oversized, EmbedMode, Embedder, EmbeddingConfig};
use crate::RagError;

const NAME: &str = "ollama";

/// Ollama embedding configuration
#[derive(Debug, Clone)]
pub struct OllamaEmbeddingConfig {
    pub base: EmbeddingConfig,
    /// Retrieval instruction prepended to queries
    pub query_instruction: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Ollama embedder
pub struct OllamaEmbedder {
    client: Client,
    config: OllamaEmbeddingConfig,
}

impl OllamaEmbedder {
    pub fn new(config: OllamaEmbeddingConfig) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(config.base.timeout)
            .build()
            .map_err(|e| RagError::Embedding(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn format_input(&self, text: &str, mode: EmbedMode) -> String {
        match mode {
            EmbedMode::SearchDocument => text.to_string(),
            EmbedMode::SearchQuery if self.config.query_instruction.is_empty() => text.to_string(),
            EmbedMode::SearchQuery => {
                format!("Instruct: {}\nQuery:{}", self.config.query_instruction, text)
            }
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String], mode: EmbedMode) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        warn_if_oversized(NAME, texts.len(), self.config.base.max_batch_size);

        let request = EmbedRequest {
            model: &self.config.base.model,
            input: texts.iter().map(|t| self.format_input(t, mode)).collect(),
        };

        let url = format!("{}/api/embed", self.config.base.endpoint);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("Ollama request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "Ollama embedding failed: {} - {}",
                status, text
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("Failed to parse Ollama response: {}", e)))?;

        check_count(NAME, texts.len(), embed_response.embeddings)
    }

    fn dimension(&self) -> usize {
        self.config.base.dimension
    }

    fn name(&self) -> &str {
        NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn embedder(instruction: &str) -> OllamaEmbedder {
        OllamaEmbedder::new(OllamaEmbeddingConfig {
            base: EmbeddingConfig {
                endpoint: "http://127.0.0.1:9".into(),
                api_key: None,
                model: "qwen3-embedding:0.6b".into(),
                dimension: 1024,
                max_batch_size: 96,
                timeout: Duration::from_secs(1),
            },
            query_instruction: instruction.into(),
        })
        .unwrap()
    }

    #[test]
    fn test_query_prefix() {
        let e = embedder("Find the answer");
        assert_eq!(
            e.format_input("open hours?", EmbedMode::SearchQuery),
            "Instruct: Find the answer\nQuery:open hours?"
        );
        assert_eq!(e.format_input("doc", EmbedMode::SearchDocument), "doc");
    }

    #[test]
    fn test_no_instruction_passthrough() {
        let e = embedder("");
        assert_eq!(e.format_input("q", EmbedMode::SearchQuery), "q");
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let e = embedder("x");
        assert!(e.embed(&[], EmbedMode::SearchDocument).await.unwrap().is_empty());
    }
}
