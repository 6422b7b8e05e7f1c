//! Pagevoice - PDF-to-audio generation with grounded insights
//!
//! A local-first tool that turns PDFs into narrated or two-speaker dialogue
//! audio, backed by a retrieval index over your document library so you can
//! search and ask grounded questions about what you've ingested.
//!
//! # Overview
//!
//! Pagevoice allows you to:
//! - Ingest PDFs, chunk and embed them into a searchable vector index
//! - Generate narration or two-speaker dialogue scripts from a document
//! - Synthesize that script into a single merged, chaptered audio file
//! - Search the document library semantically
//! - Ask grounded questions (insights) about one or more documents, with citations
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `retrieval` - PDF ingestion, chunking, embedding and the in-memory vector index
//! - `script` - Script synthesis (narration/dialogue) from retrieved chunks
//! - `tts` - Text-to-speech provider dispatch and clip normalization
//! - `mux` - Clip concatenation into a single chaptered audio artifact
//! - `insights` - Retrieval-grounded insights and cross-document comparison
//! - `pipeline` - Coordinates the above into the crate's external request/response surface
//!
//! # Example
//!
//! ```rust,no_run
//! use pagevoice::config::Settings;
//! use pagevoice::pipeline::{AudioSource, GenerateAudioRequest, Pipeline};
//! use pagevoice::script::VoiceConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let pipeline = Pipeline::from_settings(settings).await?;
//!
//!     let artifact = pipeline
//!         .generate_audio(GenerateAudioRequest {
//!             source: AudioSource::Document {
//!                 filename: "report.pdf".to_string(),
//!             },
//!             podcast: false,
//!             two_speakers: false,
//!             accent: None,
//!             style: None,
//!             expressiveness: None,
//!             voices: VoiceConfig {
//!                 speaker_a: "Puck".to_string(),
//!                 speaker_b: "Kore".to_string(),
//!             },
//!             speakers_override: None,
//!         })
//!         .await?;
//!     println!("Generated {}", artifact.path.display());
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod insights;
pub mod mux;
pub mod openai;
pub mod pipeline;
pub mod retrieval;
pub mod script;
pub mod tts;

pub use error::{CoreError, Result};
