//! Local tool converter
//!
//! - PDFs: `pdf-extract` in a blocking task
//! - images: `tesseract <input> stdout`
//! - audio: `whisper <input> --output_format txt`
//! - video: `ffmpeg` extracts a 16 kHz mono WAV track, then whisper
//!
//! Inputs are staged in a per-call temp directory removed on drop.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use knowledge_config::constants::local_tools;
use knowledge_config::MediaSettings;
use tempfile::TempDir;
use tokio::process::Command;

use crate::{mime, MediaError, MediaToTextConverter};

const NAME: &str = "local";

#[derive(Debug, Clone)]
pub struct LocalConfig {
    pub tesseract_path: String,
    pub whisper_path: String,
    pub whisper_model: String,
    pub ffmpeg_path: String,
    /// Language hint for OCR (`-l`) and ASR (`--language`)
    pub language: Option<String>,
}

impl LocalConfig {
    pub fn from_settings(settings: &MediaSettings) -> Self {
        let local = &settings.local;
        Self {
            tesseract_path: local.tesseract_path.clone(),
            whisper_path: local.whisper_path.clone(),
            whisper_model: local.whisper_model.clone(),
            ffmpeg_path: local.ffmpeg_path.clone(),
            language: local.language.clone().filter(|l| !l.is_empty()),
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            tesseract_path: local_tools::TESSERACT.to_string(),
            whisper_path: local_tools::WHISPER.to_string(),
            whisper_model: local_tools::WHISPER_MODEL.to_string(),
            ffmpeg_path: local_tools::FFMPEG.to_string(),
            language: None,
        }
    }
}

/// Converter backed by locally installed tools
pub struct LocalConverter {
    config: LocalConfig,
}

impl LocalConverter {
    pub fn new(config: LocalConfig) -> Self {
        Self { config }
    }

    async fn stage(&self, data: &[u8], mime_type: &str, stem: &str) -> Result<(TempDir, PathBuf), MediaError> {
        let dir = tempfile::Builder::new().prefix("knowledge-media-").tempdir()?;
        let path = dir
            .path()
            .join(format!("{}.{}", stem, mime::extension_for(mime_type)));
        tokio::fs::write(&path, data).await?;
        Ok((dir, path))
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<String, MediaError> {
        tracing::debug!(program, ?args, "Running local media tool");

        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MediaError::backend(NAME, format!("failed to start {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::backend(
                NAME,
                format!("{} exited with {}: {}", program, output.status, stderr.trim()),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Transcribe a staged audio file with whisper; the transcript lands
    /// next to the input as `<stem>.txt`.
    async fn transcribe_file(&self, input: &Path) -> Result<String, MediaError> {
        let output_dir = input
            .parent()
            .ok_or_else(|| MediaError::backend(NAME, "staged file has no parent directory"))?;
        let input_str = path_str(input)?;
        let output_dir_str = path_str(output_dir)?;

        let mut args = vec![
            input_str,
            "--model",
            self.config.whisper_model.as_str(),
            "--output_format",
            "txt",
            "--output_dir",
            output_dir_str,
        ];
        if let Some(language) = &self.config.language {
            args.push("--language");
            args.push(language);
        }

        self.run(&self.config.whisper_path, &args).await?;

        let transcript_path = input.with_extension("txt");
        let transcript = tokio::fs::read_to_string(&transcript_path)
            .await
            .map_err(|e| MediaError::backend(NAME, format!("whisper produced no transcript: {}", e)))?;

        Ok(normalize_lines(&transcript))
    }
}

fn path_str(path: &Path) -> Result<&str, MediaError> {
    path.to_str()
        .ok_or_else(|| MediaError::backend(NAME, format!("non UTF-8 temp path {:?}", path)))
}

/// Join non-empty trimmed lines with single spaces
fn normalize_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// pdf-extract can panic on malformed fonts, so run it in a blocking task
/// and treat a panic like any other extraction failure.
async fn extract_pdf(data: Vec<u8>) -> Result<String, MediaError> {
    let joined = tokio::task::spawn_blocking(move || {
        std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&data))
    })
    .await
    .map_err(|e| MediaError::backend(NAME, format!("pdf task failed: {}", e)))?;

    match joined {
        Ok(Ok(text)) => Ok(text.trim().to_string()),
        Ok(Err(e)) => Err(MediaError::backend(NAME, format!("pdf extraction failed: {}", e))),
        Err(_) => Err(MediaError::backend(NAME, "pdf extraction panicked")),
    }
}

#[async_trait]
impl MediaToTextConverter for LocalConverter {
    async fn image_to_text(&self, data: &[u8], mime_type: &str) -> Result<String, MediaError> {
        let (_dir, input) = self.stage(data, mime_type, "image").await?;
        let input_str = path_str(&input)?;

        let mut args = vec![input_str, "stdout"];
        if let Some(language) = &self.config.language {
            args.push("-l");
            args.push(language);
        }

        let text = self.run(&self.config.tesseract_path, &args).await?;
        Ok(text.trim().to_string())
    }

    async fn audio_to_text(&self, data: &[u8], mime_type: &str) -> Result<String, MediaError> {
        let (_dir, input) = self.stage(data, mime_type, "audio").await?;
        self.transcribe_file(&input).await
    }

    async fn video_to_text(&self, data: &[u8], mime_type: &str) -> Result<String, MediaError> {
        let (_dir, input) = self.stage(data, mime_type, "video").await?;
        let wav = input.with_file_name("track.wav");
        let sample_rate = local_tools::EXTRACT_SAMPLE_RATE.to_string();

        self.run(
            &self.config.ffmpeg_path,
            &[
                "-y",
                "-i",
                path_str(&input)?,
                "-vn",
                "-ar",
                sample_rate.as_str(),
                "-ac",
                "1",
                "-f",
                "wav",
                path_str(&wav)?,
            ],
        )
        .await?;

        self.transcribe_file(&wav).await
    }

    async fn pdf_to_text(&self, data: &[u8]) -> Result<String, MediaError> {
        tracing::debug!(bytes = data.len(), "Extracting PDF text");
        extract_pdf(data.to_vec()).await
    }

    fn name(&self) -> &str {
        NAME
    }
}
