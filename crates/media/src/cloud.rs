//! Google Cloud OCR/ASR converter
//!
//! - images: Cloud Vision `images:annotate` with `TEXT_DETECTION`
//! - PDFs: Cloud Vision `files:annotate` with `DOCUMENT_TEXT_DETECTION`
//! - audio: Speech-to-Text `speech:recognize`
//!
//! Video is not handled by this backend.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use knowledge_config::MediaSettings;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{MediaError, MediaToTextConverter};

const NAME: &str = "cloud";

#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub vision_endpoint: String,
    pub speech_endpoint: String,
    pub api_key: Option<String>,
    pub language_code: String,
    pub timeout: Duration,
}

impl CloudConfig {
    pub fn from_settings(settings: &MediaSettings) -> Self {
        let cloud = &settings.cloud;
        Self {
            vision_endpoint: cloud.vision_endpoint.trim_end_matches('/').to_string(),
            speech_endpoint: cloud.speech_endpoint.trim_end_matches('/').to_string(),
            api_key: cloud.api_key.clone().filter(|k| !k.is_empty()),
            language_code: cloud.language_code.clone(),
            timeout: Duration::from_millis(settings.timeout_ms),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    full_text_annotation: Option<TextAnnotation>,
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    #[serde(default)]
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateFileResponseBatch {
    #[serde(default)]
    responses: Vec<AnnotateFileResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateFileResponse {
    /// One entry per page
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
    #[serde(default)]
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
}

impl AnnotateImageResponse {
    fn into_text(self) -> Result<String, MediaError> {
        if let Some(status) = self.error {
            return Err(MediaError::backend(NAME, format!("annotation error: {}", status.message)));
        }
        let text = match self.full_text_annotation {
            Some(full) => full.text,
            // first entry is the whole detected text block
            None => self
                .text_annotations
                .into_iter()
                .next()
                .map(|a| a.description)
                .unwrap_or_default(),
        };
        Ok(text.trim().to_string())
    }
}

/// Speech-to-Text encoding for a MIME type; `None` lets the API detect it
fn speech_encoding(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    match essence {
        "audio/flac" | "audio/x-flac" => Some("FLAC"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("LINEAR16"),
        "audio/ogg" => Some("OGG_OPUS"),
        "audio/webm" => Some("WEBM_OPUS"),
        "audio/mpeg" | "audio/mp3" => Some("MP3"),
        "audio/amr" => Some("AMR"),
        _ => None,
    }
}

/// Google Cloud Vision / Speech-to-Text converter
pub struct CloudConverter {
    config: CloudConfig,
    client: Client,
}

impl CloudConverter {
    pub fn new(config: CloudConfig) -> Result<Self, MediaError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MediaError::backend(NAME, format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    async fn post<T: for<'de> Deserialize<'de>>(&self, url: String, body: Value) -> Result<T, MediaError> {
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.query(&[("key", key)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MediaError::backend(NAME, format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(MediaError::backend(NAME, format!("{} returned {} - {}", url, status, text)));
        }

        response
            .json()
            .await
            .map_err(|e| MediaError::backend(NAME, format!("invalid response: {}", e)))
    }

    async fn annotate_image(&self, image: Value) -> Result<String, MediaError> {
        let body = json!({
            "requests": [{
                "image": image,
                "features": [{ "type": "TEXT_DETECTION" }]
            }]
        });

        let url = format!("{}/images:annotate", self.config.vision_endpoint);
        let parsed: AnnotateResponse = self.post(url, body).await?;

        parsed
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| MediaError::backend(NAME, "empty annotate response"))?
            .into_text()
    }
}

#[async_trait]
impl MediaToTextConverter for CloudConverter {
    async fn image_to_text(&self, data: &[u8], _mime_type: &str) -> Result<String, MediaError> {
        tracing::debug!(bytes = data.len(), "Cloud OCR on image");
        self.annotate_image(json!({ "content": BASE64_STANDARD.encode(data) }))
            .await
    }

    async fn image_url_to_text(&self, url: &str) -> Result<String, MediaError> {
        tracing::debug!(url, "Cloud OCR on image URL");
        self.annotate_image(json!({ "source": { "imageUri": url } }))
            .await
    }

    async fn audio_to_text(&self, data: &[u8], mime_type: &str) -> Result<String, MediaError> {
        let mut config = json!({
            "languageCode": self.config.language_code,
            "enableAutomaticPunctuation": true
        });
        if let Some(encoding) = speech_encoding(mime_type) {
            config["encoding"] = json!(encoding);
        }

        let body = json!({
            "config": config,
            "audio": { "content": BASE64_STANDARD.encode(data) }
        });

        tracing::debug!(bytes = data.len(), mime_type, "Cloud speech recognition");
        let url = format!("{}/speech:recognize", self.config.speech_endpoint);
        let parsed: RecognizeResponse = self.post(url, body).await?;

        let transcript = parsed
            .results
            .into_iter()
            .filter_map(|r| r.alternatives.into_iter().next())
            .map(|a| a.transcript.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(transcript)
    }

    async fn video_to_text(&self, _data: &[u8], _mime_type: &str) -> Result<String, MediaError> {
        Err(MediaError::not_supported(NAME, "video_to_text"))
    }

    async fn pdf_to_text(&self, data: &[u8]) -> Result<String, MediaError> {
        let body = json!({
            "requests": [{
                "inputConfig": {
                    "content": BASE64_STANDARD.encode(data),
                    "mimeType": "application/pdf"
                },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }]
            }]
        });

        tracing::debug!(bytes = data.len(), "Cloud OCR on PDF");
        let url = format!("{}/files:annotate", self.config.vision_endpoint);
        let parsed: AnnotateFileResponseBatch = self.post(url, body).await?;

        let file = parsed
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| MediaError::backend(NAME, "empty files:annotate response"))?;
        if let Some(status) = file.error {
            return Err(MediaError::backend(NAME, format!("annotation error: {}", status.message)));
        }

        let pages = file
            .responses
            .into_iter()
            .map(AnnotateImageResponse::into_text)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pages
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    fn name(&self) -> &str {
        NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_encoding() {
        assert_eq!(speech_encoding("audio/flac"), Some("FLAC"));
        assert_eq!(speech_encoding("audio/webm;codecs=opus"), Some("WEBM_OPUS"));
        assert_eq!(speech_encoding("audio/unknown"), None);
    }

    #[test]
    fn test_annotation_prefers_full_text() {
        let resp: AnnotateImageResponse = serde_json::from_value(json!({
            "fullTextAnnotation": { "text": " Invoice 42\n" },
            "textAnnotations": [{ "description": "ignored" }]
        }))
        .unwrap();
        assert_eq!(resp.into_text().unwrap(), "Invoice 42");

        let resp: AnnotateImageResponse = serde_json::from_value(json!({
            "textAnnotations": [{ "description": "STOP" }, { "description": "S" }]
        }))
        .unwrap();
        assert_eq!(resp.into_text().unwrap(), "STOP");
    }

    #[test]
    fn test_annotation_error_surfaces() {
        let resp: AnnotateImageResponse = serde_json::from_value(json!({
            "error": { "code": 3, "message": "Bad image data." }
        }))
        .unwrap();
        let err = resp.into_text().unwrap_err();
        assert!(err.to_string().contains("Bad image data."));
    }
}
