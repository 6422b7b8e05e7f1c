//! Insights command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::{InsightsRequest, Pipeline};
use anyhow::Result;

/// Run the insights command.
pub async fn run_insights(subject: &str, filenames: Vec<String>, settings: Settings) -> Result<()> {
    preflight::check(Operation::Insights)?;

    let pipeline = Pipeline::from_settings(settings).await?;
    let spinner = Output::spinner("Thinking...");

    let filenames = if filenames.is_empty() { None } else { Some(filenames) };

    let result = pipeline
        .insights(InsightsRequest {
            subject: subject.to_string(),
            filenames,
        })
        .await;

    spinner.finish_and_clear();

    match result {
        Ok(response) => {
            println!("{}", response.insights);
            if !response.sources.is_empty() {
                Output::header("Sources");
                for source in &response.sources {
                    Output::list_item(&format!(
                        "{} p.{} (score: {:.2})",
                        source.filename, source.page_number, source.score
                    ));
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Insights failed: {}", e));
            return Err(anyhow::anyhow!("{}", e));
        }
    }

    Ok(())
}
