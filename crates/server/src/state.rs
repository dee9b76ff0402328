//! Application State
//!
//! Shared state for the chat-serving path.

use std::sync::Arc;

use knowledge_agent::AgentConfigCache;
use knowledge_config::Settings;
use knowledge_core::{AgentConfigLoader, Error, RagQuery, RagResponse, Result};
use knowledge_media::MediaToTextConverter;
use knowledge_persistence::PersistenceLayer;
use knowledge_rag::{
    build_embedder, build_vector_store, Chunker, ChunkerConfig, ContentProcessor, Embedder,
    QueryDefaults, RagService,
};
use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

/// Everything a chat turn needs from the knowledge base
#[derive(Debug, Clone, Serialize)]
pub struct ChatContext {
    pub agent_id: Uuid,
    pub behavior: String,
    pub system_instruction: String,
    /// User prompt with the retrieved context rendered in
    pub prompt: String,
    pub retrieval: RagResponse,
}

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub rag: Arc<RagService>,
    pub agents: Arc<dyn AgentConfigLoader>,
    pub agent_cache: Arc<AgentConfigCache>,
}

impl AppState {
    /// Build every component from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        let embedder = build_embedder(&settings.embedding)?;
        let persistence =
            knowledge_persistence::init(&settings.persistence, embedder.dimension()).await?;
        let media = knowledge_media::build_converter(&settings.media)?;

        Self::assemble(settings, persistence, embedder, media).await
    }

    /// Build from already constructed backends
    pub async fn assemble(
        settings: Settings,
        persistence: PersistenceLayer,
        embedder: Arc<dyn Embedder>,
        media: Option<Arc<dyn MediaToTextConverter>>,
    ) -> Result<Self> {
        if media.is_none() {
            tracing::warn!("No media processors configured; media ingestion disabled");
        }

        let store = build_vector_store(
            &settings.vector_store,
            embedder.dimension(),
            Arc::clone(&persistence.chunks),
        )
        .await?;

        let processor = ContentProcessor::new(
            Chunker::new(ChunkerConfig::from_settings(&settings.rag.chunking)),
            embedder,
            media,
        );

        let rag = RagService::new(
            Arc::clone(&persistence.documents),
            processor,
            store,
            QueryDefaults::from_settings(&settings.rag),
        );

        let agent_cache = AgentConfigCache::from_settings(&settings.agent_cache);

        Ok(Self {
            settings: Arc::new(settings),
            rag: Arc::new(rag),
            agents: persistence.agents,
            agent_cache: Arc::new(agent_cache),
        })
    }

    /// Start the agent cache sweeper; send `true` on the returned channel
    /// to stop it
    pub fn start_background_tasks(&self) -> watch::Sender<bool> {
        self.agent_cache.start_cleanup_task()
    }

    /// Retrieve context for `question` and render the agent's prompt
    #[tracing::instrument(skip(self, question), fields(agent_id = %agent_id))]
    pub async fn chat_context(&self, agent_id: Uuid, question: &str) -> Result<ChatContext> {
        let agent = self
            .agent_cache
            .get_or_load(agent_id, self.agents.as_ref())
            .await?
            .ok_or_else(|| Error::NotFound(format!("agent {}", agent_id)))?;

        let retrieval = self.rag.query(RagQuery::new(agent_id, question)).await?;
        let prompt = agent.render_prompt(&retrieval.context, question);

        tracing::debug!(chunks = retrieval.chunks.len(), "Chat context assembled");

        Ok(ChatContext {
            agent_id,
            behavior: agent.behavior.clone(),
            system_instruction: agent.system_instruction.clone(),
            prompt,
            retrieval,
        })
    }
}
