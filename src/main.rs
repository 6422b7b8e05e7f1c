//! Pagevoice CLI entry point.

use anyhow::Result;
use clap::Parser;
use pagevoice::cli::{commands, Cli, Commands};
use pagevoice::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("pagevoice={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.temp_dir())?;

    match cli.command {
        Commands::Init => {
            commands::run_init(&settings)?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Ingest { path } => {
            commands::run_ingest(&path, settings).await?;
        }

        Commands::GenerateAudio {
            filename,
            mode,
            style,
            accent,
            expressiveness,
            speaker_voice,
        } => {
            commands::run_generate_audio(&filename, mode, style, accent, expressiveness, speaker_voice, settings).await?;
        }

        Commands::Search {
            query,
            limit,
            fetch_k,
            min_score,
        } => {
            commands::run_search(&query, limit, fetch_k, min_score, settings).await?;
        }

        Commands::Insights { subject, filenames } => {
            commands::run_insights(&subject, filenames, settings).await?;
        }

        Commands::CrossInsights { filenames, focus } => {
            commands::run_cross_insights(filenames, &focus, settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(&host, port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, settings)?;
        }
    }

    Ok(())
}
