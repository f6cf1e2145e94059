//! Error types for Lectern.

use thiserror::Error;

/// Library-level error type for Lectern operations.
///
/// The first group of variants is stage-scoped: each one belongs to exactly one
/// pipeline stage and ends the run that produced it.
#[derive(Error, Debug)]
pub enum LecternError {
    #[error("Invalid video source: {0}")]
    InvalidSource(String),

    #[error("Video fetch failed: {0}")]
    Fetch(String),

    #[error("Segmentation failed (exit code {}): {detail}", display_exit_code(.exit_code))]
    Segment {
        exit_code: Option<i32>,
        detail: String,
    },

    #[error("Duration probe failed for segment {segment_index}: {reason}")]
    Probe { segment_index: usize, reason: String },

    #[error("Transcription failed for segment {segment_index}: {reason}")]
    Transcribe { segment_index: usize, reason: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Pipeline run exceeded {0} seconds")]
    RunTimeout(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),
}

impl LecternError {
    /// Pipeline stage this error belongs to, used as a structured log field.
    pub fn stage(&self) -> &'static str {
        match self {
            LecternError::InvalidSource(_) | LecternError::Fetch(_) | LecternError::Http(_) => "fetch",
            LecternError::Segment { .. } | LecternError::Probe { .. } | LecternError::ToolFailed(_) => {
                "segment"
            }
            LecternError::Transcribe { .. } | LecternError::OpenAI(_) => "transcribe",
            LecternError::Persistence(_) | LecternError::Database(_) => "persist",
            LecternError::RunTimeout(_) => "timeout",
            _ => "internal",
        }
    }
}

fn display_exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

/// Result type alias for Lectern operations.
pub type Result<T> = std::result::Result<T, LecternError>;
