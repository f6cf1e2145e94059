//! OpenAI Whisper describer.
//!
//! Transcribes the segment's audio track and renders every returned speech
//! segment as a `[hh:mm:ss to hh:mm:ss] text` line, so spoken lectures produce
//! the same marker text as a vision-capable describer.
//!
//! Stream-copied video segments are usually larger than the transcription
//! endpoint accepts, so when a [`MediaTool`] is attached the audio track is
//! extracted to a small mono MP3 first and only that file is uploaded.

use super::timestamps::format_hms;
use super::{upload_file_name, Describer};
use crate::error::{LecternError, Result};
use crate::media::MediaTool;
use crate::openai::create_client;
use async_openai::types::{AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Largest file the transcription endpoint accepts, in bytes.
pub const UPLOAD_LIMIT_BYTES: u64 = 25 * 1024 * 1024;

/// OpenAI Whisper-based describer.
pub struct WhisperDescriber {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    language: Option<String>,
    audio_tool: Option<Arc<dyn MediaTool>>,
}

impl WhisperDescriber {
    /// Create a new Whisper describer with default settings.
    pub fn new() -> Self {
        Self::with_config("whisper-1", None, None)
    }

    /// Create a new Whisper describer with custom configuration.
    ///
    /// `api_key` overrides the `OPENAI_API_KEY` variable.
    pub fn with_config(model: &str, language: Option<String>, api_key: Option<&str>) -> Self {
        Self {
            client: create_client(api_key),
            model: model.to_string(),
            language,
            audio_tool: None,
        }
    }

    /// Upload only the extracted audio track, cut with `tool`.
    pub fn with_audio_tool(mut self, tool: Arc<dyn MediaTool>) -> Self {
        self.audio_tool = Some(tool);
        self
    }

    /// File to upload for `media_path`, and whether it was created here.
    async fn upload_source(&self, media_path: &Path) -> Result<(PathBuf, bool)> {
        match &self.audio_tool {
            Some(tool) => {
                let audio = media_path.with_extension("audio.mp3");
                tool.extract_audio(media_path, &audio).await?;
                Ok((audio, true))
            }
            None => Ok((media_path.to_path_buf(), false)),
        }
    }
}

/// Reject uploads the endpoint would refuse.
fn check_upload_size(path: &Path, size: u64) -> Result<()> {
    if size > UPLOAD_LIMIT_BYTES {
        return Err(LecternError::OpenAI(format!(
            "{} is {} bytes, over the {} byte upload limit; lower pipeline.segment_seconds",
            upload_file_name(path),
            size,
            UPLOAD_LIMIT_BYTES
        )));
    }
    Ok(())
}

impl Default for WhisperDescriber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Describer for WhisperDescriber {
    /// The instruction goes out as the transcription prompt. Markers are built
    /// from the returned segment timings.
    #[instrument(skip(self, instruction), fields(media_path = %media_path.display()))]
    async fn describe(&self, media_path: &Path, instruction: &str) -> Result<String> {
        let (upload_path, extracted) = self.upload_source(media_path).await?;
        let file_bytes = tokio::fs::read(&upload_path).await?;
        if extracted {
            if let Err(e) = tokio::fs::remove_file(&upload_path).await {
                warn!("Failed to remove {:?}: {}", upload_path, e);
            }
        }
        check_upload_size(&upload_path, file_bytes.len() as u64)?;

        let mut request_builder = CreateTranscriptionRequestArgs::default();
        request_builder
            .file(async_openai::types::AudioInput::from_vec_u8(
                upload_file_name(&upload_path),
                file_bytes,
            ))
            .model(&self.model)
            .response_format(AudioResponseFormat::VerboseJson);

        if !instruction.trim().is_empty() {
            request_builder.prompt(instruction);
        }

        if let Some(lang) = &self.language {
            request_builder.language(lang);
        }

        let request = request_builder.build().map_err(|e| {
            LecternError::OpenAI(format!("Failed to build request: {}", e))
        })?;

        let response = self
            .client
            .audio()
            .transcribe_verbose_json(request)
            .await
            .map_err(|e| LecternError::OpenAI(format!("Whisper API error: {}", e)))?;

        let lines: Vec<String> = match response.segments {
            Some(segments) => segments
                .iter()
                .map(|s| marker_line(s.start as f64, s.end as f64, &s.text))
                .filter(|line| !line.is_empty())
                .collect(),
            // Fallback: one marker spanning the whole response
            None => vec![marker_line(0.0, response.duration as f64, &response.text)],
        };

        debug!("Rendered {} marker lines", lines.len());
        Ok(lines.join("\n"))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Render one marker line, or an empty string when there is no text.
fn marker_line(start: f64, end: f64, text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }
    let start = start.max(0.0).floor() as u64;
    let end = (end.max(0.0).ceil() as u64).max(start);
    format!("[{} to {}] {}", format_hms(start), format_hms(end), text)
}
