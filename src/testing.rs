//! Fakes for the external capabilities, shared by unit tests.

use crate::error::{LecternError, Result};
use crate::media::{parse_segment_index, MediaTool, Segment};
use crate::transcription::Describer;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Segment at `index` with a made-up file path.
pub fn segment_at(index: usize, start_offset: f64, duration: f64) -> Segment {
    Segment {
        index,
        path: PathBuf::from(format!("/tmp/lectern-test/segment_{}.mp4", index)),
        duration,
        start_offset,
    }
}

/// Write a small source file under `dir` and return its `file://` URL.
pub fn local_source(dir: &Path) -> String {
    let path = dir.join("lecture.mp4");
    std::fs::write(&path, b"not really a video").unwrap();
    url::Url::from_file_path(&path).unwrap().to_string()
}

/// [`MediaTool`] that writes empty segment files with preset durations.
pub struct FakeMediaTool {
    durations: Vec<f64>,
    segment_exit_code: Option<i32>,
    failing_probe: Option<usize>,
}

impl FakeMediaTool {
    pub fn new(durations: Vec<f64>) -> Self {
        Self {
            durations,
            segment_exit_code: None,
            failing_probe: None,
        }
    }

    /// Make `segment` fail as if the cutter exited with `exit_code`.
    pub fn failing_segment(mut self, exit_code: i32) -> Self {
        self.segment_exit_code = Some(exit_code);
        self
    }

    pub fn failing_probe(mut self, index: usize) -> Self {
        self.failing_probe = Some(index);
        self
    }
}

#[async_trait]
impl MediaTool for FakeMediaTool {
    async fn segment(&self, _input: &Path, output_dir: &Path, _segment_seconds: u32) -> Result<()> {
        tokio::fs::create_dir_all(output_dir).await?;

        if let Some(code) = self.segment_exit_code {
            return Err(LecternError::Segment {
                exit_code: Some(code),
                detail: "fake cutter failure".to_string(),
            });
        }

        // Unpadded names, so lexical and numeric order disagree past ten parts.
        for index in 0..self.durations.len() {
            let path = output_dir.join(format!("segment_{}.mp4", index));
            tokio::fs::write(path, b"segment").await?;
        }
        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let index = parse_segment_index(&name)
            .ok_or_else(|| LecternError::ToolFailed(format!("not a segment file: {}", name)))?
            as usize;

        if self.failing_probe == Some(index) {
            return Err(LecternError::ToolFailed(format!("cannot probe {}", name)));
        }

        self.durations
            .get(index)
            .copied()
            .ok_or_else(|| LecternError::ToolFailed(format!("no duration for {}", name)))
    }

    async fn extract_audio(&self, _input: &Path, output: &Path) -> Result<()> {
        tokio::fs::write(output, b"audio").await?;
        Ok(())
    }
}

/// Scripted describer response.
#[derive(Clone)]
pub struct Reply {
    outcome: std::result::Result<String, String>,
    delay: Duration,
}

impl Reply {
    pub fn text(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_string()),
            delay: Duration::ZERO,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            delay: Duration::ZERO,
        }
    }

    pub fn after_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }
}

/// [`Describer`] answering per segment index, parsed from the media file name.
///
/// Segments without a scripted reply get `[00:00:00 to 00:00:10] segment <n>`.
/// Tracks how many calls overlap.
#[derive(Default)]
pub struct FakeDescriber {
    replies: HashMap<usize, Reply>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeDescriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, index: usize, reply: Reply) -> Self {
        self.replies.insert(index, reply);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Describer for FakeDescriber {
    async fn describe(&self, media_path: &Path, _instruction: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let name = media_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let index = parse_segment_index(&name).unwrap_or_default() as usize;

        let reply = self
            .replies
            .get(&index)
            .cloned()
            .unwrap_or_else(|| Reply::text(&format!("[00:00:00 to 00:00:10] segment {}", index)));

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }

        reply.outcome.map_err(LecternError::OpenAI)
    }

    fn name(&self) -> &str {
        "fake"
    }
}
