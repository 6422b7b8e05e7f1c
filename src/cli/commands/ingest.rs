//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::{IngestRequest, Pipeline};
use anyhow::Result;
use std::path::PathBuf;

/// Run the ingest command.
pub async fn run_ingest(path: &str, settings: Settings) -> Result<()> {
    preflight::check(Operation::Ingest)?;

    let pipeline = Pipeline::from_settings(settings).await?;
    let spinner = Output::spinner("Ingesting document...");

    let result = pipeline
        .ingest(IngestRequest {
            path: PathBuf::from(path),
        })
        .await;

    spinner.finish_and_clear();

    match result {
        Ok(response) => {
            Output::success(&format!("Ingested {}", response.filename));
            Output::document_info(&response.filename, response.chunk_count);
        }
        Err(e) => {
            Output::error(&format!("Ingest failed: {}", e));
            return Err(anyhow::anyhow!("{}", e));
        }
    }

    Ok(())
}
