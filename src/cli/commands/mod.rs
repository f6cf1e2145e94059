//! CLI command implementations.

mod config;
mod doctor;
mod ingest;
mod serve;
mod status;
mod transcript;

pub use config::run_config;
pub use doctor::run_doctor;
pub use ingest::run_ingest;
pub use serve::{router, run_serve, AppState};
pub use status::run_status;
pub use transcript::{render_transcript, run_transcript, TranscriptFormat};
