//! Status command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::store::{ChunkSink, SqliteStore, StatusReporter};
use anyhow::Result;

/// Run the status command.
pub async fn run_status(owner_id: Option<&str>, settings: Settings) -> Result<()> {
    let store = SqliteStore::new(&settings.sqlite_path())?;

    let Some(owner_id) = owner_id else {
        let records = store.list_statuses()?;
        if records.is_empty() {
            Output::info("No lectures have been processed yet.");
            Output::info("Use 'lectern ingest <owner_id> <url>' to add one.");
            return Ok(());
        }

        Output::header(&format!("Lectures ({})", records.len()));
        println!();
        for record in &records {
            Output::status_line(record);
        }
        return Ok(());
    };

    match store.status_record(owner_id).await? {
        Some(record) => {
            Output::status_line(&record);
            let chunks = store.chunks(owner_id).await?;
            Output::kv("Chunks", &chunks.len().to_string());
        }
        None => {
            Output::info(&format!("'{}' has not been processed (NOT_STARTED).", owner_id));
        }
    }

    Ok(())
}
