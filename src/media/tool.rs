//! External media tool invocation (ffmpeg / ffprobe).

use crate::config::MediaSettings;
use crate::error::{LecternError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

/// File name prefix for segment files.
pub const SEGMENT_PREFIX: &str = "segment_";

/// Capability for cutting and probing media files.
///
/// Implementations must not depend on state beyond their inputs, so tests can
/// substitute a fake without real binaries.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Cut `input` into consecutive `segment_seconds` parts inside `output_dir`,
    /// without re-encoding, each part starting its own timestamps at zero.
    /// Files are named `segment_<n>.<ext>` with `n` counting up from zero.
    async fn segment(&self, input: &Path, output_dir: &Path, segment_seconds: u32) -> Result<()>;

    /// Container duration of `path` in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<f64>;

    /// Write the audio track of `input` to `output` as low-bitrate mono MP3.
    async fn extract_audio(&self, input: &Path, output: &Path) -> Result<()>;
}

/// [`MediaTool`] backed by the ffmpeg and ffprobe binaries.
pub struct FfmpegTool {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegTool {
    pub fn new(settings: &MediaSettings) -> Self {
        Self {
            ffmpeg: settings.ffmpeg.clone(),
            ffprobe: settings.ffprobe.clone(),
        }
    }
}

impl Default for FfmpegTool {
    fn default() -> Self {
        Self::new(&MediaSettings::default())
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    #[instrument(skip(self), fields(input = %input.display()))]
    async fn segment(&self, input: &Path, output_dir: &Path, segment_seconds: u32) -> Result<()> {
        tokio::fs::create_dir_all(output_dir).await?;

        let extension = input
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        let pattern = output_dir.join(format!("{}%03d.{}", SEGMENT_PREFIX, extension));

        debug!("Segmenting into {}s parts", segment_seconds);

        let result = Command::new(&self.ffmpeg)
            .arg("-hide_banner")
            .arg("-loglevel").arg("error")
            .arg("-i").arg(input)
            .arg("-map").arg("0")
            .arg("-c").arg("copy")
            .arg("-f").arg("segment")
            .arg("-segment_time").arg(segment_seconds.to_string())
            .arg("-reset_timestamps").arg("1")
            .arg("-y")
            .arg(&pattern)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        match result {
            Ok(out) if out.status.success() => Ok(()),
            Ok(out) => Err(LecternError::Segment {
                exit_code: out.status.code(),
                detail: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(LecternError::ToolNotFound(self.ffmpeg.clone()))
            }
            Err(e) => Err(LecternError::Segment {
                exit_code: None,
                detail: format!("could not start {}: {}", self.ffmpeg, e),
            }),
        }
    }

    /// Queries the duration using ffprobe with JSON output.
    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let result = Command::new(&self.ffprobe)
            .arg("-v").arg("error")
            .arg("-print_format").arg("json")
            .arg("-show_format")
            .arg(path)
            .output()
            .await;

        let output = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LecternError::ToolNotFound(self.ffprobe.clone()));
            }
            Err(e) => {
                return Err(LecternError::ToolFailed(format!("{} failed: {}", self.ffprobe, e)));
            }
        };

        if !output.status.success() {
            return Err(LecternError::ToolFailed(format!(
                "{} exited with {}: {}",
                self.ffprobe,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    #[instrument(skip(self), fields(input = %input.display()))]
    async fn extract_audio(&self, input: &Path, output: &Path) -> Result<()> {
        let out = Command::new(&self.ffmpeg)
            .arg("-hide_banner")
            .arg("-loglevel").arg("error")
            .arg("-i").arg(input)
            .arg("-vn")
            .arg("-ac").arg("1")
            .arg("-ar").arg("16000")
            .arg("-c:a").arg("libmp3lame")
            .arg("-b:a").arg("64k")
            .arg("-y")
            .arg(output)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.tool_error(e))?;

        if !out.status.success() {
            return Err(LecternError::ToolFailed(format!(
                "{} exited with {} extracting audio: {}",
                self.ffmpeg,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(())
    }
}

impl FfmpegTool {
    fn tool_error(&self, e: std::io::Error) -> LecternError {
        if e.kind() == std::io::ErrorKind::NotFound {
            LecternError::ToolNotFound(self.ffmpeg.clone())
        } else {
            LecternError::ToolFailed(format!("could not start {}: {}", self.ffmpeg, e))
        }
    }
}

/// Extract `format.duration` from ffprobe's JSON output.
fn parse_probe_output(json_str: &str) -> Result<f64> {
    let parsed: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|_| LecternError::ToolFailed("Invalid ffprobe output".into()))?;

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| LecternError::ToolFailed("Could not determine duration".into()))
}
