//! Vision-model converter
//!
//! Talks to an OpenAI-compatible API:
//! - images go to `/chat/completions` as a base64 data URL (or the remote URL)
//! - audio goes to `/audio/transcriptions` as a multipart upload
//!
//! Video and PDF are not handled by this backend.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use knowledge_config::MediaSettings;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{mime, MediaError, MediaToTextConverter};

const NAME: &str = "vision";

/// Vision converter configuration
#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// API base URL, e.g. `https://api.openai.com/v1`
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub transcription_model: String,
    /// Instruction sent alongside every image
    pub prompt: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl VisionConfig {
    pub fn from_settings(settings: &MediaSettings) -> Self {
        let vision = &settings.vision;
        Self {
            endpoint: vision.endpoint.trim_end_matches('/').to_string(),
            api_key: vision.api_key.clone().filter(|k| !k.is_empty()),
            model: vision.model.clone(),
            transcription_model: vision.transcription_model.clone(),
            prompt: vision.prompt.clone(),
            max_tokens: vision.max_tokens,
            timeout: Duration::from_millis(settings.timeout_ms),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// OpenAI-compatible multimodal converter
pub struct VisionConverter {
    config: VisionConfig,
    client: Client,
}

impl VisionConverter {
    pub fn new(config: VisionConfig) -> Result<Self, MediaError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MediaError::backend(NAME, format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn describe_image(&self, url: String) -> Result<String, MediaError> {
        let body = ChatRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: &self.config.prompt },
                    ContentPart::ImageUrl { image_url: ImageUrl { url } },
                ],
            }],
        };

        let endpoint = format!("{}/chat/completions", self.config.endpoint);
        tracing::debug!(model = %self.config.model, "Requesting image description");

        let response = self
            .authorized(self.client.post(&endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| MediaError::backend(NAME, format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(MediaError::backend(NAME, format!("chat completion failed: {} - {}", status, text)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| MediaError::backend(NAME, format!("invalid chat response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| MediaError::backend(NAME, "response contained no choices"))
    }
}

#[async_trait]
impl MediaToTextConverter for VisionConverter {
    async fn image_to_text(&self, data: &[u8], mime_type: &str) -> Result<String, MediaError> {
        let data_url = format!("data:{};base64,{}", mime_type, BASE64_STANDARD.encode(data));
        self.describe_image(data_url).await
    }

    async fn image_url_to_text(&self, url: &str) -> Result<String, MediaError> {
        self.describe_image(url.to_string()).await
    }

    async fn audio_to_text(&self, data: &[u8], mime_type: &str) -> Result<String, MediaError> {
        let part = reqwest::multipart::Part::bytes(data.to_vec())
            .file_name(format!("audio.{}", mime::extension_for(mime_type)))
            .mime_str(mime_type)
            .map_err(|e| MediaError::backend(NAME, format!("invalid mime type: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .text("model", self.config.transcription_model.clone())
            .part("file", part);

        let endpoint = format!("{}/audio/transcriptions", self.config.endpoint);
        tracing::debug!(bytes = data.len(), mime_type, "Requesting transcription");

        let response = self
            .authorized(self.client.post(&endpoint))
            .multipart(form)
            .send()
            .await
            .map_err(|e| MediaError::backend(NAME, format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(MediaError::backend(NAME, format!("transcription failed: {} - {}", status, text)));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| MediaError::backend(NAME, format!("invalid transcription response: {}", e)))?;

        Ok(parsed.text.trim().to_string())
    }

    async fn video_to_text(&self, _data: &[u8], _mime_type: &str) -> Result<String, MediaError> {
        Err(MediaError::not_supported(NAME, "video_to_text"))
    }

    async fn pdf_to_text(&self, _data: &[u8]) -> Result<String, MediaError> {
        Err(MediaError::not_supported(NAME, "pdf_to_text"))
    }

    fn name(&self) -> &str {
        NAME
    }
}
