//! Pipeline orchestrator for Lectern.
//!
//! Drives one run for one owning record: fetch the source video, cut it into
//! segments, transcribe segments concurrently, and append the rebased chunks to the
//! sink in segment order while keeping the record's status current.

use crate::config::{Prompts, Settings};
use crate::error::{LecternError, Result};
use crate::media::{remove_working_dir, FfmpegTool, MediaFetcher, MediaTool, Segment, Segmenter};
use crate::store::{Chunk, ChunkSink, ProcessingStatus, SqliteStore, StatusReporter};
use crate::transcription::{create_describer, rebase_markers, Describer, SegmentTranscriber};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Status writer for a single run.
///
/// Only forward transitions are written; `FAILED` may follow any non-terminal
/// status and nothing follows a terminal one.
pub struct StatusMachine {
    owner_id: String,
    reporter: Arc<dyn StatusReporter>,
    current: Option<ProcessingStatus>,
}

impl StatusMachine {
    pub fn new(owner_id: &str, reporter: Arc<dyn StatusReporter>) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            reporter,
            current: None,
        }
    }

    /// Last status successfully written by this run.
    pub fn current(&self) -> Option<ProcessingStatus> {
        self.current
    }

    /// Write `next` if the transition is allowed.
    pub async fn advance(&mut self, next: ProcessingStatus) -> Result<()> {
        if let Some(current) = self.current {
            if !current.can_transition_to(next) {
                return Err(LecternError::Persistence(format!(
                    "status of {} cannot move from {} to {}",
                    self.owner_id, current, next
                )));
            }
        }

        self.reporter.set_status(&self.owner_id, next).await?;
        debug!("Status of {} is now {}", self.owner_id, next);
        self.current = Some(next);
        Ok(())
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub owner_id: String,
    pub run_id: Uuid,
    /// SHA-256 of the fetched source.
    pub content_hash: String,
    /// Number of segments the video was cut into.
    pub segments: usize,
    /// Number of chunks appended to the sink.
    pub chunks_persisted: usize,
}

/// The main orchestrator for the Lectern pipeline.
pub struct PipelineOrchestrator {
    settings: Settings,
    fetcher: MediaFetcher,
    segmenter: Segmenter,
    transcriber: Arc<SegmentTranscriber>,
    sink: Arc<dyn ChunkSink>,
    reporter: Arc<dyn StatusReporter>,
}

impl PipelineOrchestrator {
    /// Create an orchestrator wired to ffmpeg, the configured describer and the
    /// SQLite store.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let tool: Arc<dyn MediaTool> = Arc::new(FfmpegTool::new(&settings.media));
        let describer = create_describer(&settings.describer, tool.clone())?;
        info!("Using {} describer ({})", settings.describer.provider, describer.name());

        let store = Arc::new(SqliteStore::new(&settings.sqlite_path())?);

        Self::with_components(settings, prompts, tool, describer, store.clone(), store)
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        tool: Arc<dyn MediaTool>,
        describer: Arc<dyn Describer>,
        sink: Arc<dyn ChunkSink>,
        reporter: Arc<dyn StatusReporter>,
    ) -> Result<Self> {
        settings.validate()?;

        let work_dir = settings.work_dir();
        std::fs::create_dir_all(&work_dir)?;

        let fetcher = MediaFetcher::new(&settings)?;
        let instruction = prompts.describe_instruction(settings.pipeline.segment_seconds);
        let transcriber = Arc::new(SegmentTranscriber::new(
            describer,
            instruction,
            settings.pipeline.segment_timeout(),
        ));

        Ok(Self {
            settings,
            fetcher,
            segmenter: Segmenter::new(tool),
            transcriber,
            sink,
            reporter,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sink(&self) -> Arc<dyn ChunkSink> {
        self.sink.clone()
    }

    pub fn reporter(&self) -> Arc<dyn StatusReporter> {
        self.reporter.clone()
    }

    /// Process the video at `video_url` for `owner_id`.
    ///
    /// The returned error is informational; the stored status (`FAILED`) is the only
    /// failure signal clients see. The run's working directory is gone by the time
    /// this returns, whatever the outcome.
    #[instrument(skip(self, video_url), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self, owner_id: &str, video_url: &str) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));

        let working_dir = self.fetcher.working_dir_for(run_id);
        let mut machine = StatusMachine::new(owner_id, self.reporter.clone());

        let limit = self.settings.pipeline.run_timeout();
        let work = self.execute(owner_id, video_url, run_id, &working_dir, &mut machine);
        let outcome = match tokio::time::timeout(limit, work).await {
            Ok(result) => result,
            Err(_) => Err(LecternError::RunTimeout(limit.as_secs())),
        };

        let outcome = match outcome {
            Ok(report) => {
                info!(
                    "Run finished: {} segments, {} chunks",
                    report.segments, report.chunks_persisted
                );
                Ok(report)
            }
            Err(e) => {
                warn!(stage = e.stage(), "Run failed: {}", e);
                if let Err(status_err) = machine.advance(ProcessingStatus::Failed).await {
                    warn!("Could not record failure for {}: {}", owner_id, status_err);
                }
                Err(e)
            }
        };

        remove_working_dir(&working_dir).await;
        outcome
    }

    async fn execute(
        &self,
        owner_id: &str,
        video_url: &str,
        run_id: Uuid,
        working_dir: &Path,
        machine: &mut StatusMachine,
    ) -> Result<RunReport> {
        machine.advance(ProcessingStatus::NotStarted).await?;
        machine.advance(ProcessingStatus::Downloading).await?;
        let source = self.fetcher.parse_source(video_url)?;
        let video = self
            .fetcher
            .fetch_into(&source, working_dir.to_path_buf())
            .await?;

        machine.advance(ProcessingStatus::Processing).await?;
        let segments = self
            .segmenter
            .segment(&video, self.settings.pipeline.segment_seconds)
            .await?;

        let chunks_persisted = self.transcribe_segments(owner_id, &segments).await?;

        machine.advance(ProcessingStatus::Done).await?;

        Ok(RunReport {
            owner_id: owner_id.to_string(),
            run_id,
            content_hash: video.content_hash,
            segments: segments.len(),
            chunks_persisted,
        })
    }

    /// Transcribe all segments and append their chunks in order.
    ///
    /// Fragments may complete in any order; each is rebased and held until every
    /// lower order has been appended. Returns the number of chunks appended. On the
    /// first error the pending calls are dropped and held chunks are discarded.
    ///
    /// Each call owns its segment and a handle to the transcriber so the run future
    /// stays `Send` and can be spawned.
    async fn transcribe_segments(&self, owner_id: &str, segments: &[Segment]) -> Result<usize> {
        let concurrency = self.settings.pipeline.max_concurrent_segments.max(1);
        info!(
            "Transcribing {} segments ({} at a time)",
            segments.len(),
            concurrency
        );

        let transcriber = self.transcriber.clone();
        let mut completed = stream::iter(segments.to_vec())
            .map(move |segment| {
                let transcriber = transcriber.clone();
                async move {
                    let outcome = transcriber.transcribe(&segment).await;
                    (segment, outcome)
                }
                .boxed()
            })
            .buffer_unordered(concurrency);

        let mut held: BTreeMap<usize, Chunk> = BTreeMap::new();
        let mut next_order = 0;

        while let Some((segment, outcome)) = completed.next().await {
            let fragment = outcome?;
            let content = rebase_markers(&fragment.text, segment.start_offset);
            held.insert(
                segment.index,
                Chunk {
                    order: segment.index,
                    content,
                },
            );

            while let Some(chunk) = held.remove(&next_order) {
                self.sink.append(owner_id, &chunk).await?;
                debug!("Persisted chunk {}", chunk.order);
                next_order += 1;
            }
        }

        Ok(next_order)
    }
}
