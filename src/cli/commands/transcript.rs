//! Transcript command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::store::{assemble_transcript, Chunk, ChunkSink, ProcessingStatus, SqliteStore, StatusReporter};
use anyhow::Result;
use serde::Serialize;

/// Output format for a stored transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptFormat {
    /// Chunks joined in order, one marker line after another.
    Text,
    /// Status and chunk list as JSON.
    Json,
}

impl std::str::FromStr for TranscriptFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(TranscriptFormat::Text),
            "json" => Ok(TranscriptFormat::Json),
            _ => Err(format!("Unknown format: {}. Use text or json.", s)),
        }
    }
}

/// Exportable transcript with status.
#[derive(Debug, Serialize)]
pub struct ExportedTranscript<'a> {
    pub owner_id: &'a str,
    pub status: ProcessingStatus,
    pub chunk_count: usize,
    pub chunks: &'a [Chunk],
}

/// Render `chunks` in the requested format.
pub fn render_transcript(
    owner_id: &str,
    status: ProcessingStatus,
    chunks: &[Chunk],
    format: TranscriptFormat,
) -> Result<String> {
    Ok(match format {
        TranscriptFormat::Text => assemble_transcript(chunks),
        TranscriptFormat::Json => serde_json::to_string_pretty(&ExportedTranscript {
            owner_id,
            status,
            chunk_count: chunks.len(),
            chunks,
        })?,
    })
}

/// Run the transcript command.
pub async fn run_transcript(
    owner_id: &str,
    format: &str,
    output: Option<String>,
    settings: Settings,
) -> Result<()> {
    let format: TranscriptFormat = format.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let store = SqliteStore::new(&settings.sqlite_path())?;
    let status = store.status(owner_id).await?;
    let chunks = store.chunks(owner_id).await?;

    if chunks.is_empty() {
        Output::error(&format!("No transcript stored for '{}' ({}).", owner_id, status));
        Output::info("Use 'lectern status' to see processed lectures.");
        return Ok(());
    }
    if status != ProcessingStatus::Done {
        Output::warning(&format!(
            "'{}' is {}; the transcript is incomplete.",
            owner_id, status
        ));
    }

    let rendered = render_transcript(owner_id, status, &chunks, format)?;

    match output {
        Some(path) => {
            std::fs::write(&path, &rendered)?;
            Output::success(&format!("Transcript written to {}", path));
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
