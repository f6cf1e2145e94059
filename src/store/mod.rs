//! Chunk and status storage for Lectern.
//!
//! Provides trait-based interfaces for the two durable collaborators of the
//! pipeline: the chunk sink that transcript chunks are appended to, and the status
//! reporter that clients poll for progress.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A rebased transcript fragment, the unit appended to a [`ChunkSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of the source segment; chunks sorted by order form the transcript.
    pub order: usize,
    /// Text with absolute `[hh:mm:ss to hh:mm:ss]` markers.
    pub content: String,
}

/// Lifecycle status of a video-owning record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    NotStarted,
    Downloading,
    Processing,
    Done,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::NotStarted => "NOT_STARTED",
            ProcessingStatus::Downloading => "DOWNLOADING",
            ProcessingStatus::Processing => "PROCESSING",
            ProcessingStatus::Done => "DONE",
            ProcessingStatus::Failed => "FAILED",
        }
    }

    /// `DONE` and `FAILED` end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Done | ProcessingStatus::Failed)
    }

    /// Whether a new run may start for a record in this status.
    ///
    /// Finished or apparently running records need `force`.
    pub fn allows_new_run(&self, force: bool) -> bool {
        match self {
            ProcessingStatus::NotStarted | ProcessingStatus::Failed => true,
            ProcessingStatus::Downloading | ProcessingStatus::Processing | ProcessingStatus::Done => force,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            ProcessingStatus::NotStarted => 0,
            ProcessingStatus::Downloading => 1,
            ProcessingStatus::Processing => 2,
            ProcessingStatus::Done => 3,
            ProcessingStatus::Failed => 4,
        }
    }

    /// Whether a run may move from `self` to `next`.
    ///
    /// Forward moves along `NOT_STARTED → DOWNLOADING → PROCESSING → DONE` are
    /// allowed, `FAILED` is reachable from every non-terminal state, and nothing
    /// leaves a terminal state.
    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == ProcessingStatus::Failed || next.rank() > self.rank()
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NOT_STARTED" => Ok(ProcessingStatus::NotStarted),
            "DOWNLOADING" => Ok(ProcessingStatus::Downloading),
            "PROCESSING" => Ok(ProcessingStatus::Processing),
            "DONE" => Ok(ProcessingStatus::Done),
            "FAILED" => Ok(ProcessingStatus::Failed),
            _ => Err(format!("Unknown processing status: {}", s)),
        }
    }
}

/// Stored status of one owning record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    pub owner_id: String,
    pub status: ProcessingStatus,
    pub updated_at: DateTime<Utc>,
}

/// Durable store that a record's chunks are appended to.
#[async_trait]
pub trait ChunkSink: Send + Sync {
    /// Append a chunk under `owner_id`.
    ///
    /// A run appends each order at most once. Appending an order that is already
    /// stored, as a later run does, replaces its content in place; nothing is ever
    /// deleted.
    async fn append(&self, owner_id: &str, chunk: &Chunk) -> Result<()>;

    /// All chunks for `owner_id`, sorted by order.
    async fn chunks(&self, owner_id: &str) -> Result<Vec<Chunk>>;
}

/// Durable, last-write-wins status record per owner.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Overwrite the current status of `owner_id`.
    async fn set_status(&self, owner_id: &str, status: ProcessingStatus) -> Result<()>;

    /// Full stored record, if any.
    async fn status_record(&self, owner_id: &str) -> Result<Option<StatusRecord>>;

    /// Current status; an absent record means `NOT_STARTED`.
    async fn status(&self, owner_id: &str) -> Result<ProcessingStatus> {
        Ok(self
            .status_record(owner_id)
            .await?
            .map(|r| r.status)
            .unwrap_or(ProcessingStatus::NotStarted))
    }
}

/// Join chunks, already sorted by order, into one transcript.
pub fn assemble_transcript(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|c| c.content.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}
