//! CLI module for pagevoice.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand, ValueEnum};

/// pagevoice - turn PDFs into narrated or dialogue audio, with a
/// retrieval-grounded insights layer on top of your document library.
#[derive(Parser, Debug)]
#[command(name = "pagevoice")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CliScriptMode {
    Narration,
    Dialogue,
}

/// Parse a `label=voice` pair for `--speaker-voice`.
fn parse_speaker_voice(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((label, voice)) if !label.is_empty() && !voice.is_empty() => {
            Ok((label.to_string(), voice.to_string()))
        }
        _ => Err(format!("expected \"label=voice\", got \"{raw}\"")),
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize pagevoice and verify system requirements
    Init,

    /// Check system requirements and configuration
    Doctor,

    /// Ingest a PDF into the document library and index it for retrieval
    Ingest {
        /// Path to the PDF file
        path: String,
    },

    /// Generate narrated or two-speaker dialogue audio for an ingested document
    GenerateAudio {
        /// Filename as shown by `pagevoice ingest` or `pagevoice search`
        filename: String,

        /// Script mode: narration or dialogue
        #[arg(long, value_enum, default_value = "narration")]
        mode: CliScriptMode,

        /// Style hint override (e.g. "formal", "casual")
        #[arg(long)]
        style: Option<String>,

        /// Accent hint override
        #[arg(long)]
        accent: Option<String>,

        /// Expressiveness hint override
        #[arg(long)]
        expressiveness: Option<String>,

        /// Per-speaker voice override, repeatable (e.g. --speaker-voice "Speaker 1=en-US-Wavenet-A")
        #[arg(long = "speaker-voice", value_parser = parse_speaker_voice)]
        speaker_voice: Vec<(String, String)>,
    },

    /// Search the indexed document library for relevant excerpts
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Over-fetch this many candidates before page-level dedup
        #[arg(long)]
        fetch_k: Option<usize>,

        /// Drop hits scoring below this similarity
        #[arg(long)]
        min_score: Option<f32>,
    },

    /// Produce grounded insights about a subject from the document library
    Insights {
        /// Subject or question to investigate
        subject: String,

        /// Restrict to specific filenames (comma-separated)
        #[arg(long, value_delimiter = ',')]
        filenames: Vec<String>,
    },

    /// Compare claims across two or more documents
    CrossInsights {
        /// Filenames to compare (comma-separated, at least two)
        #[arg(long, value_delimiter = ',', required = true)]
        filenames: Vec<String>,

        /// What to focus the comparison on
        focus: String,
    },

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "script.model")
        key: String,
        /// Configuration value
        value: String,
    },

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
