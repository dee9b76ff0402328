//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{agent_cache, chunking, embedding, endpoints, local_tools, retrieval, timeouts};
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation
    #[default]
    Development,
    Staging,
    /// Production mode - credentials required for cloud providers
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub observability: ObservabilitySettings,

    #[serde(default)]
    pub embedding: EmbeddingSettings,

    #[serde(default)]
    pub vector_store: VectorStoreSettings,

    #[serde(default)]
    pub persistence: PersistenceSettings,

    #[serde(default)]
    pub media: MediaSettings,

    #[serde(default)]
    pub rag: RagSettings,

    #[serde(default)]
    pub agent_cache: AgentCacheSettings,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_embedding()?;
        self.validate_vector_store()?;
        self.validate_persistence()?;
        self.validate_media()?;
        self.validate_rag()?;
        self.validate_agent_cache()?;
        Ok(())
    }

    fn validate_embedding(&self) -> Result<(), ConfigError> {
        let emb = &self.embedding;

        if emb.dimension == 0 {
            return Err(invalid("embedding.dimension", "Must be at least 1"));
        }
        if emb.max_batch_size == 0 {
            return Err(invalid("embedding.max_batch_size", "Must be at least 1"));
        }

        match emb.provider {
            EmbeddingProvider::Hash => {}
            EmbeddingProvider::Cohere | EmbeddingProvider::Ollama => {
                if emb.endpoint.trim().is_empty() {
                    return Err(invalid("embedding.endpoint", "Required for remote providers"));
                }
                if emb.model.trim().is_empty() {
                    return Err(invalid("embedding.model", "Required for remote providers"));
                }
            }
        }

        if emb.provider == EmbeddingProvider::Cohere
            && self.environment.is_production()
            && is_blank(&emb.api_key)
        {
            return Err(ConfigError::MissingField("embedding.api_key".to_string()));
        }

        Ok(())
    }

    fn validate_vector_store(&self) -> Result<(), ConfigError> {
        let vs = &self.vector_store;
        if vs.layout == VectorStoreLayout::Split && vs.index == IndexBackend::Qdrant {
            if vs.qdrant_endpoint.trim().is_empty() {
                return Err(invalid("vector_store.qdrant_endpoint", "Required for the qdrant index"));
            }
            if vs.collection.trim().is_empty() {
                return Err(invalid("vector_store.collection", "Must not be empty"));
            }
        }
        if vs.layout == VectorStoreLayout::Unified
            && self.persistence.backend == PersistenceBackend::Postgres
            && self.embedding.dimension > 16_000
        {
            return Err(invalid(
                "embedding.dimension",
                "pgvector columns support at most 16000 dimensions",
            ));
        }
        Ok(())
    }

    fn validate_persistence(&self) -> Result<(), ConfigError> {
        let p = &self.persistence;
        if p.backend == PersistenceBackend::Postgres {
            if p.database_url.trim().is_empty() {
                return Err(invalid("persistence.database_url", "Required for postgres"));
            }
            if p.max_connections == 0 {
                return Err(invalid("persistence.max_connections", "Must be at least 1"));
            }
        }
        Ok(())
    }

    fn validate_media(&self) -> Result<(), ConfigError> {
        let media = &self.media;
        for kind in &media.processors {
            match kind {
                MediaProcessorKind::Vision => {
                    if media.vision.endpoint.trim().is_empty() {
                        return Err(invalid("media.vision.endpoint", "Required when vision is enabled"));
                    }
                    if self.environment.is_production() && is_blank(&media.vision.api_key) {
                        return Err(ConfigError::MissingField("media.vision.api_key".to_string()));
                    }
                }
                MediaProcessorKind::Cloud => {
                    if media.cloud.vision_endpoint.trim().is_empty()
                        || media.cloud.speech_endpoint.trim().is_empty()
                    {
                        return Err(invalid("media.cloud", "Vision and speech endpoints are required"));
                    }
                    if self.environment.is_production() && is_blank(&media.cloud.api_key) {
                        return Err(ConfigError::MissingField("media.cloud.api_key".to_string()));
                    }
                }
                MediaProcessorKind::Local => {
                    if media.local.ffmpeg_path.trim().is_empty() {
                        return Err(invalid("media.local.ffmpeg_path", "Must not be empty"));
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_rag(&self) -> Result<(), ConfigError> {
        let rag = &self.rag;

        if rag.default_top_k == 0 {
            return Err(invalid("rag.default_top_k", "Must be at least 1"));
        }

        if !(0.0..=1.0).contains(&rag.default_threshold) {
            return Err(invalid(
                "rag.default_threshold",
                &format!("Must be between 0.0 and 1.0, got {}", rag.default_threshold),
            ));
        }

        let c = &rag.chunking;
        for (field, value) in [
            ("rag.chunking.text_chars", c.text_chars),
            ("rag.chunking.pdf_chars", c.pdf_chars),
            ("rag.chunking.transcript_chars", c.transcript_chars),
        ] {
            if value == 0 {
                return Err(invalid(field, "Must be at least 1"));
            }
        }

        Ok(())
    }

    fn validate_agent_cache(&self) -> Result<(), ConfigError> {
        let cache = &self.agent_cache;
        if cache.ttl_secs == 0 {
            return Err(invalid("agent_cache.ttl_secs", "Must be at least 1 second"));
        }
        if cache.cleanup_interval_secs == 0 {
            return Err(invalid("agent_cache.cleanup_interval_secs", "Must be at least 1 second"));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Prometheus scrape port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_metrics_port() -> u16 {
    9090
}
fn default_true() -> bool {
    true
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
            metrics_port: default_metrics_port(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    Cohere,
    Ollama,
    /// Offline deterministic embedder
    Hash,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    /// Base URL; empty picks the provider default
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub model: String,

    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Provider batch limit; larger batches are logged, not split
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Instruction prefixed to queries by instruction-tuned providers
    #[serde(default = "default_query_instruction")]
    pub query_instruction: String,

    #[serde(default = "default_embedding_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_dimension() -> usize {
    embedding::DIMENSION
}
fn default_max_batch_size() -> usize {
    embedding::MAX_BATCH_SIZE
}
fn default_query_instruction() -> String {
    embedding::QUERY_INSTRUCTION.to_string()
}
fn default_embedding_timeout_ms() -> u64 {
    timeouts::EMBEDDING_MS
}

impl EmbeddingSettings {
    /// Configured endpoint, or the provider's default
    pub fn resolved_endpoint(&self) -> String {
        if !self.endpoint.trim().is_empty() {
            return self.endpoint.trim_end_matches('/').to_string();
        }
        match self.provider {
            EmbeddingProvider::Cohere => endpoints::COHERE_DEFAULT.to_string(),
            EmbeddingProvider::Ollama => endpoints::OLLAMA_DEFAULT.to_string(),
            EmbeddingProvider::Hash => String::new(),
        }
    }

    /// Configured model, or the provider's default
    pub fn resolved_model(&self) -> String {
        if !self.model.trim().is_empty() {
            return self.model.clone();
        }
        match self.provider {
            EmbeddingProvider::Cohere => embedding::COHERE_MODEL.to_string(),
            EmbeddingProvider::Ollama => embedding::OLLAMA_MODEL.to_string(),
            EmbeddingProvider::Hash => "hash".to_string(),
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            endpoint: endpoints::COHERE_DEFAULT.to_string(),
            api_key: None,
            model: embedding::COHERE_MODEL.to_string(),
            dimension: default_dimension(),
            max_batch_size: default_max_batch_size(),
            query_instruction: default_query_instruction(),
            timeout_ms: default_embedding_timeout_ms(),
        }
    }
}

/// Where vectors live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreLayout {
    /// Embeddings stored on the chunk rows, searched with the cosine operator
    #[default]
    Unified,
    /// Embeddings in an external index, chunk rows without vectors
    Split,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    #[default]
    Qdrant,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreSettings {
    #[serde(default)]
    pub layout: VectorStoreLayout,

    /// External index used by the split layout
    #[serde(default)]
    pub index: IndexBackend,

    #[serde(default = "default_qdrant_endpoint")]
    pub qdrant_endpoint: String,

    #[serde(default)]
    pub qdrant_api_key: Option<String>,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_qdrant_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_qdrant_endpoint() -> String {
    endpoints::QDRANT_DEFAULT.to_string()
}
fn default_collection() -> String {
    retrieval::COLLECTION.to_string()
}
fn default_qdrant_timeout_secs() -> u64 {
    timeouts::QDRANT_SECS
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            layout: VectorStoreLayout::default(),
            index: IndexBackend::default(),
            qdrant_endpoint: default_qdrant_endpoint(),
            qdrant_api_key: None,
            collection: default_collection(),
            timeout_secs: default_qdrant_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    #[default]
    Postgres,
    /// In-process maps, lost on restart
    Memory,
}

/// Relational store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceSettings {
    #[serde(default)]
    pub backend: PersistenceBackend,

    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Create the pgvector extension and tables at startup
    #[serde(default = "default_true")]
    pub ensure_schema: bool,
}

fn default_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| endpoints::POSTGRES_DEFAULT.to_string())
}
fn default_max_connections() -> u32 {
    10
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::default(),
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            ensure_schema: true,
        }
    }
}

/// Media converter variant, listed in fallback order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaProcessorKind {
    Vision,
    Cloud,
    Local,
}

impl MediaProcessorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vision => "vision",
            Self::Cloud => "cloud",
            Self::Local => "local",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSettings {
    /// Fallback chain order; empty disables media ingestion
    #[serde(default = "default_processors")]
    pub processors: Vec<MediaProcessorKind>,

    #[serde(default)]
    pub vision: VisionMediaSettings,

    #[serde(default)]
    pub cloud: CloudMediaSettings,

    #[serde(default)]
    pub local: LocalMediaSettings,

    #[serde(default = "default_media_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_processors() -> Vec<MediaProcessorKind> {
    vec![MediaProcessorKind::Local]
}
fn default_media_timeout_ms() -> u64 {
    timeouts::MEDIA_MS
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            processors: default_processors(),
            vision: VisionMediaSettings::default(),
            cloud: CloudMediaSettings::default(),
            local: LocalMediaSettings::default(),
            timeout_ms: default_media_timeout_ms(),
        }
    }
}

/// OpenAI-compatible vision + transcription backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionMediaSettings {
    #[serde(default = "default_openai_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_vision_model")]
    pub model: String,

    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,

    /// Instruction sent with every image
    #[serde(default = "default_vision_prompt")]
    pub prompt: String,

    #[serde(default = "default_vision_max_tokens")]
    pub max_tokens: u32,
}

fn default_openai_endpoint() -> String {
    endpoints::OPENAI_DEFAULT.to_string()
}
fn default_vision_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_transcription_model() -> String {
    "whisper-1".to_string()
}
fn default_vision_prompt() -> String {
    "Extract all text visible in this image. If there is no text, describe the image in detail."
        .to_string()
}
fn default_vision_max_tokens() -> u32 {
    2048
}

impl Default for VisionMediaSettings {
    fn default() -> Self {
        Self {
            endpoint: default_openai_endpoint(),
            api_key: None,
            model: default_vision_model(),
            transcription_model: default_transcription_model(),
            prompt: default_vision_prompt(),
            max_tokens: default_vision_max_tokens(),
        }
    }
}

/// Google Cloud Vision + Speech-to-Text backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudMediaSettings {
    #[serde(default = "default_google_vision_endpoint")]
    pub vision_endpoint: String,

    #[serde(default = "default_google_speech_endpoint")]
    pub speech_endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// BCP-47 language of spoken audio
    #[serde(default = "default_language_code")]
    pub language_code: String,
}

fn default_google_vision_endpoint() -> String {
    endpoints::GOOGLE_VISION_DEFAULT.to_string()
}
fn default_google_speech_endpoint() -> String {
    endpoints::GOOGLE_SPEECH_DEFAULT.to_string()
}
fn default_language_code() -> String {
    "en-US".to_string()
}

impl Default for CloudMediaSettings {
    fn default() -> Self {
        Self {
            vision_endpoint: default_google_vision_endpoint(),
            speech_endpoint: default_google_speech_endpoint(),
            api_key: None,
            language_code: default_language_code(),
        }
    }
}

/// Locally installed tools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalMediaSettings {
    #[serde(default = "default_tesseract")]
    pub tesseract_path: String,

    #[serde(default = "default_whisper")]
    pub whisper_path: String,

    #[serde(default = "default_whisper_model")]
    pub whisper_model: String,

    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: String,

    /// Language hint passed to OCR and ASR, e.g. "eng" / "en"
    #[serde(default)]
    pub language: Option<String>,
}

fn default_tesseract() -> String {
    local_tools::TESSERACT.to_string()
}
fn default_whisper() -> String {
    local_tools::WHISPER.to_string()
}
fn default_whisper_model() -> String {
    local_tools::WHISPER_MODEL.to_string()
}
fn default_ffmpeg() -> String {
    local_tools::FFMPEG.to_string()
}

impl Default for LocalMediaSettings {
    fn default() -> Self {
        Self {
            tesseract_path: default_tesseract(),
            whisper_path: default_whisper(),
            whisper_model: default_whisper_model(),
            ffmpeg_path: default_ffmpeg(),
            language: None,
        }
    }
}

/// Retrieval and chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagSettings {
    /// Used when a query passes top_k = 0
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Used when a query passes threshold = 0.0
    #[serde(default = "default_threshold")]
    pub default_threshold: f32,

    #[serde(default)]
    pub chunking: ChunkingSettings,
}

fn default_top_k() -> usize {
    retrieval::DEFAULT_TOP_K
}
fn default_threshold() -> f32 {
    retrieval::DEFAULT_THRESHOLD
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            default_threshold: default_threshold(),
            chunking: ChunkingSettings::default(),
        }
    }
}

/// Chunk target sizes in characters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingSettings {
    #[serde(default = "default_text_chars")]
    pub text_chars: usize,

    #[serde(default = "default_pdf_chars")]
    pub pdf_chars: usize,

    /// Audio and video transcripts
    #[serde(default = "default_transcript_chars")]
    pub transcript_chars: usize,
}

fn default_text_chars() -> usize {
    chunking::TEXT_CHARS
}
fn default_pdf_chars() -> usize {
    chunking::PDF_CHARS
}
fn default_transcript_chars() -> usize {
    chunking::TRANSCRIPT_CHARS
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            text_chars: default_text_chars(),
            pdf_chars: default_pdf_chars(),
            transcript_chars: default_transcript_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCacheSettings {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_ttl_secs() -> u64 {
    agent_cache::TTL_SECS
}
fn default_cleanup_interval_secs() -> u64 {
    agent_cache::CLEANUP_INTERVAL_SECS
}

impl Default for AgentCacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (KNOWLEDGE__ prefix)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from("config", env)
}

/// Same as [`load_settings`] with an explicit config directory
pub fn load_settings_from(dir: &str, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name(&format!("{}/default", dir)).required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("{}/{}", dir, env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("KNOWLEDGE")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    tracing::debug!(
        environment = ?settings.environment,
        embedding = ?settings.embedding.provider,
        layout = ?settings.vector_store.layout,
        "Settings loaded"
    );

    Ok(settings)
}
