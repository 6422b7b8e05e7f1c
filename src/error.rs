//! Error types for the pipeline.

use thiserror::Error;

/// Crate-level error type.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("No extractable text in document: {0}")]
    EmptyExtraction(String),

    #[error("Vector dimension mismatch: index expects {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Embedding backend unavailable: {0}")]
    EmbedderUnavailable(String),

    #[error("Script synthesis failed: {reason}")]
    ScriptSynthFailed { reason: String, malformed: bool },

    #[error("All TTS providers failed for this synthesis unit")]
    AllProvidersFailed,

    #[error("Audio generation pipeline failed: {0}")]
    Pipeline(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, CoreError>;
