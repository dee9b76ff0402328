//! Qdrant-backed vector index
//!
//! One collection for all agents; each point carries `agent_id` and
//! `document_id` keyword payload used for filtered search and deletes.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use knowledge_config::VectorStoreSettings;
use qdrant_client::{
    qdrant::{
        condition::ConditionOneOf, point_id::PointIdOptions, r#match::MatchValue, Condition,
        CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, DeletePointsBuilder, Distance,
        FieldCondition, FieldType, Filter, Match, PointStruct, SearchPointsBuilder,
        UpsertPointsBuilder, VectorParamsBuilder,
    },
    Qdrant,
};
use uuid::Uuid;

use super::{IndexHit, IndexPoint, VectorIndex};
use crate::RagError;

const AGENT_ID: &str = "agent_id";
const DOCUMENT_ID: &str = "document_id";

/// Qdrant index configuration
#[derive(Debug, Clone)]
pub struct QdrantIndexConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub dimension: usize,
    pub timeout: Duration,
}

impl QdrantIndexConfig {
    pub fn from_settings(settings: &VectorStoreSettings, dimension: usize) -> Self {
        Self {
            endpoint: settings.qdrant_endpoint.clone(),
            api_key: settings.qdrant_api_key.clone().filter(|k| !k.is_empty()),
            collection: settings.collection.clone(),
            dimension,
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

/// Qdrant client wrapper
pub struct QdrantIndex {
    client: Qdrant,
    config: QdrantIndexConfig,
}

impl QdrantIndex {
    pub fn new(config: QdrantIndexConfig) -> Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&config.endpoint).timeout(config.timeout);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
            tracing::info!("Qdrant connection using API key authentication");
        }

        let client = builder
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create the cosine collection and its payload indexes if missing
    pub async fn ensure_collection(&self) -> Result<(), RagError> {
        let exists = self
            .client
            .collection_exists(&self.config.collection)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        if exists {
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.config.collection).vectors_config(
                    VectorParamsBuilder::new(self.config.dimension as u64, Distance::Cosine),
                ),
            )
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        for field in [AGENT_ID, DOCUMENT_ID] {
            self.client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    &self.config.collection,
                    field,
                    FieldType::Keyword,
                ))
                .await
                .map_err(|e| RagError::VectorStore(e.to_string()))?;
        }

        tracing::info!(
            collection = %self.config.collection,
            dimension = self.config.dimension,
            "Created Qdrant collection"
        );
        Ok(())
    }
}

fn keyword(key: &str, value: Uuid) -> Condition {
    Condition {
        condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
            key: key.to_string(),
            r#match: Some(Match {
                match_value: Some(MatchValue::Keyword(value.to_string())),
            }),
            ..Default::default()
        })),
    }
}

fn must(conditions: Vec<Condition>) -> Filter {
    Filter {
        must: conditions,
        ..Default::default()
    }
}

fn parse_point_id(options: Option<PointIdOptions>) -> Option<Uuid> {
    match options {
        Some(PointIdOptions::Uuid(u)) => Uuid::parse_str(&u).ok(),
        // chunk points are always written with uuid ids
        Some(PointIdOptions::Num(_)) | None => None,
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(&self, point: IndexPoint) -> Result<(), RagError> {
        let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
        payload.insert(AGENT_ID.to_string(), point.agent_id.to_string().into());
        payload.insert(DOCUMENT_ID.to_string(), point.document_id.to_string().into());

        let points = vec![PointStruct::new(
            point.chunk_id.to_string(),
            point.vector,
            payload,
        )];

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.config.collection, points).wait(true))
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(())
    }

    async fn query(
        &self,
        agent_id: Uuid,
        vector: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<IndexHit>, RagError> {
        let search = SearchPointsBuilder::new(&self.config.collection, vector.to_vec(), top_k as u64)
            .filter(must(vec![keyword(AGENT_ID, agent_id)]))
            .score_threshold(threshold)
            .with_payload(false);

        let results = self
            .client
            .search_points(search)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        // score_threshold is inclusive; keep only strictly better hits
        Ok(results
            .result
            .into_iter()
            .filter(|p| p.score > threshold)
            .filter_map(|p| {
                let chunk_id = parse_point_id(p.id.and_then(|id| id.point_id_options))?;
                Some(IndexHit {
                    chunk_id,
                    score: p.score,
                })
            })
            .collect())
    }

    async fn delete_agent(&self, agent_id: Uuid) -> Result<(), RagError> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.config.collection)
                    .points(must(vec![keyword(AGENT_ID, agent_id)]))
                    .wait(true),
            )
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(())
    }

    async fn delete_document(&self, agent_id: Uuid, document_id: Uuid) -> Result<(), RagError> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.config.collection)
                    .points(must(vec![
                        keyword(AGENT_ID, agent_id),
                        keyword(DOCUMENT_ID, document_id),
                    ]))
                    .wait(true),
            )
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_filter() {
        let agent = Uuid::new_v4();
        let filter = must(vec![keyword(AGENT_ID, agent)]);
        assert_eq!(filter.must.len(), 1);

        match &filter.must[0].condition_one_of {
            Some(ConditionOneOf::Field(field)) => {
                assert_eq!(field.key, "agent_id");
                let value = field.r#match.as_ref().and_then(|m| m.match_value.clone());
                assert_eq!(value, Some(MatchValue::Keyword(agent.to_string())));
            }
            other => panic!("unexpected condition: {:?}", other),
        }
    }

    #[test]
    fn test_parse_point_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_point_id(Some(PointIdOptions::Uuid(id.to_string()))), Some(id));
        assert_eq!(parse_point_id(Some(PointIdOptions::Num(7))), None);
        assert_eq!(parse_point_id(None), None);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = VectorStoreSettings {
            qdrant_api_key: Some(String::new()),
            ..VectorStoreSettings::default()
        };
        let config = QdrantIndexConfig::from_settings(&settings, 384);
        assert!(config.api_key.is_none());
        assert_eq!(config.dimension, 384);
        assert_eq!(config.collection, "agent_knowledge");
    }
}
