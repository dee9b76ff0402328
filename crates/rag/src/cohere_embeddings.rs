//! Cohere Embeddings
//!
//! `POST {endpoint}/v1/embed` with `input_type` set from the embed mode.
//! Only float embeddings are requested.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::embeddings::{check_count, warn_if_oversized, EmbedMode, Embedder, EmbeddingConfig};
use crate::RagError;

const NAME: &str = "cohere";

#[derive(Debug, Clone)]
pub struct CohereEmbeddingConfig {
    pub base: EmbeddingConfig,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: &'a [String],
    input_type: &'static str,
    embedding_types: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Embeddings,
}

/// `embeddings` is keyed by type when `embedding_types` is sent, and a
/// bare list on older API versions.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Embeddings {
    ByType { float: Vec<Vec<f32>> },
    Plain(Vec<Vec<f32>>),
}

impl Embeddings {
    fn into_floats(self) -> Vec<Vec<f32>> {
        match self {
            Self::ByType { float } => float,
            Self::Plain(v) => v,
        }
    }
}

/// Cohere embedder
pub struct CohereEmbedder {
    client: Client,
    config: CohereEmbeddingConfig,
}

impl CohereEmbedder {
    pub fn new(config: CohereEmbeddingConfig) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(config.base.timeout)
            .build()
            .map_err(|e| RagError::Embedding(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Embedder for CohereEmbedder {
    async fn embed(&self, texts: &[String], mode: EmbedMode) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        warn_if_oversized(NAME, texts.len(), self.config.base.max_batch_size);

        let request = EmbedRequest {
            model: &self.config.base.model,
            texts,
            input_type: mode.as_str(),
            embedding_types: ["float"],
        };

        let url = format!("{}/v1/embed", self.config.base.endpoint);
        tracing::debug!(count = texts.len(), mode = mode.as_str(), "Requesting Cohere embeddings");

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.config.base.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("Cohere request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "Cohere embedding failed: {} - {}",
                status, text
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("Failed to parse Cohere response: {}", e)))?;

        check_count(NAME, texts.len(), embed_response.embeddings.into_floats())
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

    #[test]
    fn test_request_shape() {
        let texts = vec!["a".to_string()];
        let request = EmbedRequest {
            model: "embed-multilingual-v3.0",
            texts: &texts,
            input_type: EmbedMode::SearchQuery.as_str(),
            embedding_types: ["float"],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["input_type"], "search_query");
        assert_eq!(json["embedding_types"][0], "float");
        assert_eq!(json["texts"][0], "a");
    }

    #[test]
    fn test_response_variants() {
        let typed: EmbedResponse =
            serde_json::from_str(r#"{"id":"x","embeddings":{"float":[[0.1,0.2]]}}"#).unwrap();
        assert_eq!(typed.embeddings.into_floats(), vec![vec![0.1, 0.2]]);

        let plain: EmbedResponse = serde_json::from_str(r#"{"embeddings":[[1.0],[2.0]]}"#).unwrap();
        assert_eq!(plain.embeddings.into_floats().len(), 2);
    }
}
