//! CrossInsights command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::insights::Claim;
use crate::pipeline::{CrossInsightsRequest, Pipeline};
use anyhow::Result;

/// Run the cross-insights command.
pub async fn run_cross_insights(filenames: Vec<String>, focus: &str, settings: Settings) -> Result<()> {
    preflight::check(Operation::Insights)?;

    let pipeline = Pipeline::from_settings(settings).await?;
    let spinner = Output::spinner("Comparing documents...");

    let result = pipeline
        .cross_insights(CrossInsightsRequest {
            filenames,
            focus: focus.to_string(),
        })
        .await;

    spinner.finish_and_clear();

    match result {
        Ok(response) => {
            Output::header("Agreements");
            print_claims(&response.agreements);
            Output::header("Contradictions");
            print_claims(&response.contradictions);

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
            Output::error(&format!("Cross-document insights failed: {}", e));
            return Err(anyhow::anyhow!("{}", e));
        }
    }

    Ok(())
}

fn print_claims(claims: &[Claim]) {
    if claims.is_empty() {
        Output::list_item("None.");
        return;
    }
    for claim in claims {
        let citations = claim
            .citations
            .iter()
            .map(|c| format!("[{} p.{}]", c.filename, c.page_number))
            .collect::<Vec<_>>()
            .join(" ");
        Output::list_item(&format!("{} {}", claim.text, citations));
    }
}
