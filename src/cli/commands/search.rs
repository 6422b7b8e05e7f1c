//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::{Pipeline, SearchRequest, SearchSource};
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    limit: usize,
    fetch_k: Option<usize>,
    min_score: Option<f32>,
    settings: Settings,
) -> Result<()> {
    preflight::check(Operation::Search)?;

    let pipeline = Pipeline::from_settings(settings).await?;
    let spinner = Output::spinner("Searching...");

    let results = pipeline
        .search(SearchRequest {
            source: SearchSource::Text(query.to_string()),
            k: limit,
            fetch_k,
            min_score,
            exclude_self: false,
        })
        .await;

    spinner.finish_and_clear();

    match results {
        Ok(hits) => {
            if hits.is_empty() {
                Output::warning("No results found matching your query.");
            } else {
                Output::success(&format!("Found {} results", hits.len()));
                for hit in &hits {
                    Output::search_result(&hit.chunk.filename, hit.chunk.page_number, hit.score, &hit.chunk.text);
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(anyhow::anyhow!("{}", e));
        }
    }

    Ok(())
}
