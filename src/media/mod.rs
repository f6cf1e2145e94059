//! Media acquisition and segmentation.
//!
//! A run materializes its source video into a private working directory
//! ([`MediaFetcher`]), then cuts it into consecutive, independently timestamped
//! segments ([`Segmenter`]) using an external [`MediaTool`].

mod fetcher;
mod segmenter;
mod tool;

pub use fetcher::MediaFetcher;
pub use segmenter::{parse_segment_index, Segmenter};
pub use tool::{FfmpegTool, MediaTool};

use crate::error::{LecternError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use url::Url;

/// Container extensions ffmpeg can pick a segment muxer from.
const CONTAINER_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mov", "mkv", "webm", "avi", "flv", "ts", "mpg", "mpeg", "wmv", "ogv", "3gp",
];

/// A validated reference to the owning record's video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSource {
    url: Url,
}

impl VideoSource {
    /// Parse and validate a source URL.
    ///
    /// `http` and `https` URLs must carry a host. `file` URLs are only accepted when
    /// `allow_file_urls` is set.
    pub fn parse(input: &str, allow_file_urls: bool) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(LecternError::InvalidSource("empty video URL".to_string()));
        }

        let url = Url::parse(trimmed)
            .map_err(|e| LecternError::InvalidSource(format!("{}: {}", trimmed, e)))?;

        match url.scheme() {
            "http" | "https" => {
                if url.host_str().map_or(true, str::is_empty) {
                    return Err(LecternError::InvalidSource(format!("{} has no host", trimmed)));
                }
            }
            "file" if allow_file_urls => {
                url.to_file_path().map_err(|_| {
                    LecternError::InvalidSource(format!("{} is not a local file path", trimmed))
                })?;
            }
            scheme => {
                return Err(LecternError::InvalidSource(format!(
                    "scheme '{}' is not allowed",
                    scheme
                )));
            }
        }

        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_local(&self) -> bool {
        self.url.scheme() == "file"
    }

    /// Container extension of the last path component, used to name the working
    /// copy and its segments. `None` unless it is a known video container.
    pub fn extension(&self) -> Option<String> {
        let name = self.url.path_segments()?.last()?;
        let (_, ext) = name.rsplit_once('.')?;
        let ext = ext.to_ascii_lowercase();
        CONTAINER_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
    }
}

impl std::fmt::Display for VideoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// A locally materialized copy of a source video, owned by a single run.
#[derive(Debug, Clone)]
pub struct WorkingVideo {
    /// Path of the downloaded file.
    pub path: PathBuf,
    /// Lowercase hex SHA-256 of the downloaded bytes.
    pub content_hash: String,
    /// Directory created for this run; removed by [`WorkingVideo::cleanup`].
    pub working_dir: PathBuf,
    /// Number of bytes downloaded.
    pub size_bytes: u64,
}

impl WorkingVideo {
    /// Directory segment files are written to.
    pub fn segments_dir(&self) -> PathBuf {
        self.working_dir.join("segments")
    }

    /// Remove the working directory and everything in it.
    pub async fn cleanup(&self) {
        remove_working_dir(&self.working_dir).await;
    }
}

/// Remove a run's working directory, logging instead of failing.
pub(crate) async fn remove_working_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!("Removed working directory {:?}", dir),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove working directory {:?}: {}", dir, e),
    }
}

/// One fixed-length slice of a working video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Position in the ordered segment list; becomes the chunk order.
    pub index: usize,
    /// Path of the segment file.
    pub path: PathBuf,
    /// Probed duration in seconds.
    pub duration: f64,
    /// Absolute start time in seconds within the source video.
    pub start_offset: f64,
}

impl Segment {
    /// Absolute end time in seconds (exclusive).
    pub fn end_offset(&self) -> f64 {
        self.start_offset + self.duration
    }
}
