//! Cutting a working video into ordered, probed segments.

use super::tool::SEGMENT_PREFIX;
use super::{MediaTool, Segment, WorkingVideo};
use crate::error::{LecternError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Produces the ordered segment list for a working video.
pub struct Segmenter {
    tool: Arc<dyn MediaTool>,
}

impl Segmenter {
    pub fn new(tool: Arc<dyn MediaTool>) -> Self {
        Self { tool }
    }

    /// Cut `video` into `segment_seconds` parts.
    ///
    /// Segments are ordered by the numeric index in their file name. Each duration
    /// is probed from the segment file itself and each `start_offset` is the sum of
    /// the probed durations before it, so the ranges tile the whole video even when
    /// the last part is short or the cutter rounds to keyframes.
    #[instrument(skip(self, video), fields(video = %video.path.display()))]
    pub async fn segment(&self, video: &WorkingVideo, segment_seconds: u32) -> Result<Vec<Segment>> {
        if segment_seconds == 0 {
            return Err(LecternError::Config(
                "segment length must be greater than zero".to_string(),
            ));
        }

        let output_dir = video.segments_dir();
        self.tool
            .segment(&video.path, &output_dir, segment_seconds)
            .await?;

        let files = list_segment_files(&output_dir).await?;
        if files.is_empty() {
            return Err(LecternError::Segment {
                exit_code: Some(0),
                detail: "no segment files were produced".to_string(),
            });
        }

        let mut segments = Vec::with_capacity(files.len());
        let mut start_offset = 0.0;

        for (index, path) in files.into_iter().enumerate() {
            let duration = self
                .tool
                .probe_duration(&path)
                .await
                .map_err(|e| LecternError::Probe {
                    segment_index: index,
                    reason: e.to_string(),
                })?;

            debug!("Segment {} at {:.3}s lasts {:.3}s", index, start_offset, duration);
            segments.push(Segment {
                index,
                path,
                duration,
                start_offset,
            });
            start_offset += duration;
        }

        info!("Created {} segments covering {:.1}s", segments.len(), start_offset);
        Ok(segments)
    }
}

/// Parse the numeric index out of a `segment_<n>.<ext>` file name.
pub fn parse_segment_index(file_name: &str) -> Option<u64> {
    let rest = file_name.strip_prefix(SEGMENT_PREFIX)?;
    let digits = rest.split_once('.').map_or(rest, |(stem, _)| stem);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Segment files in `dir`, sorted by their numeric index.
async fn list_segment_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut indexed = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if let Some(index) = parse_segment_index(&name.to_string_lossy()) {
            indexed.push((index, entry.path()));
        }
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, path)| path).collect())
}
