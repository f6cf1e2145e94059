//! Segment transcription for Lectern.
//!
//! Each segment is handed to a [`Describer`], an opaque multimodal capability that
//! returns free text with segment-relative `[hh:mm:ss to hh:mm:ss]` markers.
//!
//! # Describers
//!
//! - **Whisper** (default): OpenAI audio transcription of the segment's extracted
//!   audio track, with the instruction as the prompt; each returned segment is
//!   rendered as one marker line.
//! - **Http**: a generic multimodal endpoint that receives the segment file and the
//!   instruction and answers with the marker text.

mod http;
mod segment;
pub mod timestamps;
mod whisper;

pub use http::HttpDescriber;
pub use segment::SegmentTranscriber;
pub use timestamps::{format_hms, parse_hms, rebase_markers};
pub use whisper::WhisperDescriber;

use crate::config::{DescriberProvider, DescriberSettings};
use crate::error::{LecternError, Result};
use crate::media::MediaTool;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Raw description text for one segment, timestamps relative to the segment start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptFragment {
    /// Index of the segment this fragment describes.
    pub segment_index: usize,
    /// Text with zero or more segment-relative markers.
    pub text: String,
}

/// Trait for multimodal description services.
#[async_trait]
pub trait Describer: Send + Sync {
    /// Describe the media file at `media_path` following `instruction`.
    async fn describe(&self, media_path: &Path, instruction: &str) -> Result<String>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Build the describer selected in settings.
///
/// The credential is read from `api_key_env` here, once; nothing downstream looks
/// at the environment. `tool` extracts audio for the Whisper describer.
pub fn create_describer(
    settings: &DescriberSettings,
    tool: Arc<dyn MediaTool>,
) -> Result<Arc<dyn Describer>> {
    let key = std::env::var(&settings.api_key_env).ok().filter(|k| !k.is_empty());

    match settings.provider {
        DescriberProvider::Whisper => Ok(Arc::new(
            WhisperDescriber::with_config(&settings.model, settings.language.clone(), key.as_deref())
                .with_audio_tool(tool),
        )),
        DescriberProvider::Http => {
            let endpoint = settings.endpoint.as_deref().ok_or_else(|| {
                LecternError::Config("describer.endpoint is required for the http provider".to_string())
            })?;
            Ok(Arc::new(HttpDescriber::new(endpoint, key, &settings.model)?))
        }
    }
}

/// Render a file name for upload, falling back to a generic name.
pub(crate) fn upload_file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("segment.mp4")
        .to_string()
}
