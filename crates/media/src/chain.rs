//! Priority-ordered composite converter

use std::sync::Arc;

use async_trait::async_trait;

use crate::{record_conversion, MediaError, MediaKind, MediaToTextConverter};

/// Tries each converter in order until one succeeds.
///
/// The chain is itself a [`MediaToTextConverter`]. When every converter
/// fails, the error wraps only the last failure; an empty chain fails
/// immediately with [`MediaError::NoProcessors`].
pub struct FallbackChain {
    processors: Vec<Arc<dyn MediaToTextConverter>>,
}

impl FallbackChain {
    pub fn new(processors: Vec<Arc<dyn MediaToTextConverter>>) -> Self {
        Self { processors }
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

macro_rules! first_success {
    ($chain:expr, $kind:expr, |$p:ident| $call:expr) => {{
        let mut last: Option<MediaError> = None;
        for $p in $chain.processors.iter() {
            let result = $call.await;
            record_conversion($p.name(), $kind, &result);
            match result {
                Ok(text) => return Ok(text),
                Err(e) => last = Some(e),
            }
        }
        match last {
            Some(last) => Err(MediaError::AllProcessorsFailed {
                attempts: $chain.processors.len(),
                last: Box::new(last),
            }),
            None => Err(MediaError::NoProcessors),
        }
    }};
}

#[async_trait]
impl MediaToTextConverter for FallbackChain {
    async fn image_to_text(&self, data: &[u8], mime_type: &str) -> Result<String, MediaError> {
        first_success!(self, MediaKind::Image, |p| p.image_to_text(data, mime_type))
    }

    async fn image_url_to_text(&self, url: &str) -> Result<String, MediaError> {
        first_success!(self, MediaKind::ImageUrl, |p| p.image_url_to_text(url))
    }

    async fn audio_to_text(&self, data: &[u8], mime_type: &str) -> Result<String, MediaError> {
        first_success!(self, MediaKind::Audio, |p| p.audio_to_text(data, mime_type))
    }

    async fn video_to_text(&self, data: &[u8], mime_type: &str) -> Result<String, MediaError> {
        first_success!(self, MediaKind::Video, |p| p.video_to_text(data, mime_type))
    }

    async fn pdf_to_text(&self, data: &[u8]) -> Result<String, MediaError> {
        first_success!(self, MediaKind::Pdf, |p| p.pdf_to_text(data))
    }

    fn name(&self) -> &str {
        "fallback_chain"
    }
}
