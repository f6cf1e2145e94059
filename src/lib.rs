//! Lectern - Lecture video ingestion and transcription
//!
//! Turns a lecture video into a timestamped transcript stored as ordered chunks.
//!
//! # Overview
//!
//! A run for one lecture record:
//! - Downloads the source video into a private working directory
//! - Cuts it into fixed-length segments with ffmpeg and probes their real durations
//! - Transcribes segments concurrently through a multimodal describer
//! - Rebases each fragment's `[hh:mm:ss to hh:mm:ss]` markers to absolute video time
//! - Appends chunks to the store in segment order while publishing a status
//!   (`NOT_STARTED`, `DOWNLOADING`, `PROCESSING`, `DONE` or `FAILED`)
//!
//! # Architecture
//!
//! - `config` - Configuration management
//! - `media` - Source fetching and segmentation
//! - `transcription` - Describers, per-segment calls and timestamp markers
//! - `store` - Chunk sink and status reporter
//! - `orchestrator` - Pipeline coordination
//! - `cli` - Command line and HTTP surfaces
//!
//! # Example
//!
//! ```rust,no_run
//! use lectern::config::Settings;
//! use lectern::orchestrator::PipelineOrchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = PipelineOrchestrator::new(settings)?;
//!
//!     let report = orchestrator
//!         .run("lecture-42", "https://cdn.example.com/lectures/42.mp4")
//!         .await?;
//!     println!("Stored {} chunks", report.chunks_persisted);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod openai;
pub mod orchestrator;
pub mod store;
pub mod transcription;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{LecternError, Result};
