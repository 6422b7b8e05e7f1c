//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available before
//! starting operations that would otherwise fail midway.

use crate::config::TtsSettings;
use crate::error::{CoreError, Result};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingestion needs an embedder API key.
    Ingest,
    /// Audio generation needs the script model's API key plus ffmpeg/ffprobe.
    GenerateAudio,
    /// Insights and cross-insights need an LLM API key.
    Insights,
    /// Search has no external requirements beyond an embedder key.
    Search,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation) -> Result<()> {
    match operation {
        Operation::Ingest | Operation::Search | Operation::Insights => {
            check_api_key()?;
        }
        Operation::GenerateAudio => {
            check_api_key()?;
            check_tool("ffmpeg")?;
            check_tool("ffprobe")?;
        }
    }
    Ok(())
}

/// Check whether TTS providers have usable credentials or are locally
/// installed, returning human-readable warnings rather than failing: the
/// dispatcher falls back across providers at synthesis time.
pub fn check_tts_providers(settings: &TtsSettings) -> Vec<String> {
    let mut warnings = Vec::new();

    if std::env::var("GEMINI_API_KEY").unwrap_or_default().is_empty() {
        warnings.push("GEMINI_API_KEY not set: gemini provider will be skipped".to_string());
    }
    if std::env::var("GOOGLE_TTS_API_KEY").unwrap_or_default().is_empty() {
        warnings.push("GOOGLE_TTS_API_KEY not set: google provider will be skipped".to_string());
    }
    if std::env::var("HF_API_TOKEN").unwrap_or_default().is_empty() {
        warnings.push("HF_API_TOKEN not set: huggingface provider will be skipped".to_string());
    }
    if check_tool("edge-tts").is_err() {
        warnings.push("edge-tts not found on PATH: edge provider will be skipped".to_string());
    }
    if check_tool("espeak-ng").is_err() {
        warnings.push("espeak-ng not found on PATH: offline provider will be unavailable".to_string());
    }

    if let Some(forced) = &settings.forced_provider {
        warnings.retain(|w| w.contains(forced.as_str()));
    }

    warnings
}

/// Check if OpenAI API key is configured.
fn check_api_key() -> Result<()> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(CoreError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        Err(_) => Err(CoreError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}

/// Check if an external tool is available.
fn check_tool(name: &str) -> Result<()> {
    // ffmpeg/ffprobe use -version (single dash), others use --version
    let version_arg = match name {
        "ffmpeg" | "ffprobe" => "-version",
        _ => "--version",
    };
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(CoreError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(CoreError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(CoreError::ToolNotFound(format!(
            "{}: {}",
            name, e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_tool_missing_binary() {
        assert!(check_tool("definitely-not-a-real-binary-xyz").is_err());
    }
}
