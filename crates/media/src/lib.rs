//! Media-to-text conversion for the agent knowledge base
//!
//! Features:
//! - Vision-model backend (OpenAI-compatible chat + transcription API)
//! - Cloud OCR/ASR backend (Google Cloud Vision + Speech-to-Text)
//! - Local tool backend (pdf-extract, tesseract, whisper, ffmpeg)
//! - Fallback chain composing any of the above in priority order

pub mod chain;
pub mod cloud;
pub mod error;
pub mod local;
pub mod mime;
pub mod vision;

use std::sync::Arc;

use async_trait::async_trait;
use knowledge_config::{MediaProcessorKind, MediaSettings};

pub use chain::FallbackChain;
pub use cloud::{CloudConfig, CloudConverter};
pub use error::MediaError;
pub use local::{LocalConfig, LocalConverter};
pub use vision::{VisionConfig, VisionConverter};

/// Converts binary media into searchable text
///
/// Implementations:
/// - `VisionConverter` - multimodal LLM for images, transcription API for audio
/// - `CloudConverter` - Google Cloud Vision / Speech-to-Text
/// - `LocalConverter` - locally installed tools
/// - `FallbackChain` - tries several converters in order
///
/// Every operation returns the text, [`MediaError::NotSupported`] if the
/// backend never handles that media kind, or a failure.
#[async_trait]
pub trait MediaToTextConverter: Send + Sync + 'static {
    async fn image_to_text(&self, data: &[u8], mime_type: &str) -> Result<String, MediaError>;

    /// Describe an image by URL without downloading it first
    async fn image_url_to_text(&self, _url: &str) -> Result<String, MediaError> {
        Err(MediaError::not_supported(self.name(), "image_url_to_text"))
    }

    async fn audio_to_text(&self, data: &[u8], mime_type: &str) -> Result<String, MediaError>;

    async fn video_to_text(&self, data: &[u8], mime_type: &str) -> Result<String, MediaError>;

    async fn pdf_to_text(&self, data: &[u8]) -> Result<String, MediaError>;

    /// Backend name for logging and metrics
    fn name(&self) -> &str;
}

/// Media kind, used as a metrics label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    ImageUrl,
    Audio,
    Video,
    Pdf,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::ImageUrl => "image_url",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Pdf => "pdf",
        }
    }
}

pub(crate) fn record_conversion(variant: &str, kind: MediaKind, result: &Result<String, MediaError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) if e.is_not_supported() => "unsupported",
        Err(_) => "error",
    };
    metrics::counter!(
        "media_conversions_total",
        "variant" => variant.to_string(),
        "kind" => kind.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Build the configured fallback chain
///
/// Returns `None` when no processors are configured, which disables media
/// ingestion.
pub fn build_converter(
    settings: &MediaSettings,
) -> Result<Option<Arc<dyn MediaToTextConverter>>, MediaError> {
    if settings.processors.is_empty() {
        return Ok(None);
    }

    let mut processors: Vec<Arc<dyn MediaToTextConverter>> = Vec::with_capacity(settings.processors.len());
    for kind in &settings.processors {
        let converter: Arc<dyn MediaToTextConverter> = match kind {
            MediaProcessorKind::Vision => Arc::new(VisionConverter::new(VisionConfig::from_settings(settings))?),
            MediaProcessorKind::Cloud => Arc::new(CloudConverter::new(CloudConfig::from_settings(settings))?),
            MediaProcessorKind::Local => Arc::new(LocalConverter::new(LocalConfig::from_settings(settings))),
        };
        processors.push(converter);
    }

    tracing::info!(
        processors = ?settings.processors.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
        "Media converter chain ready"
    );

    Ok(Some(Arc::new(FallbackChain::new(processors))))
}
