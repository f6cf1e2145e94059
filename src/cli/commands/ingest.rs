//! Ingest command implementation.

use crate::cli::output::format_duration;
use crate::cli::preflight;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::PipelineOrchestrator;
use crate::store::{ChunkSink, StatusReporter};
use anyhow::Result;
use std::time::Instant;

/// Run the ingest command.
pub async fn run_ingest(owner_id: &str, url: &str, force: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check_ingest(&settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'lectern doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = PipelineOrchestrator::new(settings)?;

    let current = orchestrator.reporter().status(owner_id).await?;
    if !current.allows_new_run(force) {
        Output::warning(&format!(
            "'{}' is {}. Use --force to process it again.",
            owner_id, current
        ));
        return Ok(());
    }
    if force && current.is_terminal() {
        Output::info("Existing transcript chunks will be replaced.");
    }

    Output::info(&format!("Processing {} for '{}'", url, owner_id));
    let started = Instant::now();
    let spinner = Output::spinner("Fetching, segmenting and transcribing...");
    let result = orchestrator.run(owner_id, url).await;
    spinner.finish_and_clear();

    match result {
        Ok(report) => {
            Output::success(&format!(
                "Transcribed '{}' in {}",
                owner_id,
                format_duration(started.elapsed().as_secs_f64())
            ));
            Output::kv("Run", &report.run_id.to_string());
            Output::kv("Segments", &report.segments.to_string());
            Output::kv("Chunks", &report.chunks_persisted.to_string());
            Output::kv("SHA-256", &report.content_hash);
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Failed to process '{}': {}", owner_id, e));
            let kept = orchestrator.sink().chunks(owner_id).await.map(|c| c.len()).unwrap_or(0);
            if kept > 0 {
                Output::info(&format!("{} chunks from earlier segments were kept.", kept));
            }
            Err(e.into())
        }
    }
}
