//! Configuration settings for the pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub ingest: IngestSettings,
    pub embedding: EmbeddingSettings,
    pub index: IndexSettings,
    pub script: ScriptSettings,
    pub tts: TtsSettings,
    pub server: ServerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data (document_library/, audio/).
    pub data_dir: String,
    /// Directory for temporary files.
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Size of the general I/O worker pool (LLM calls, embedding calls, mux subprocesses).
    pub bg_workers: usize,
    /// Per-request deadline in seconds.
    pub request_timeout_s: u64,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.pagevoice".to_string(),
            temp_dir: "/tmp/pagevoice".to_string(),
            log_level: "info".to_string(),
            bg_workers: 4,
            request_timeout_s: 300,
        }
    }
}

/// PDF ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Maximum accepted upload size in bytes.
    pub max_file_size: u64,
    /// Allowed file extensions (lowercase, no dot).
    pub allowed_extensions: Vec<String>,
    /// Target tokens per chunk.
    pub target_tokens: usize,
    /// Overlap tokens between adjacent chunks on the same page.
    pub overlap_tokens: usize,
    /// Maximum chunk text length in characters.
    pub max_chunk_chars: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            allowed_extensions: vec!["pdf".to_string()],
            target_tokens: 500,
            overlap_tokens: 50,
            max_chunk_chars: 4000,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai).
    pub provider: String,
    /// Embedding model to use.
    pub model: String,
    /// Fixed embedding dimension, set at index creation.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// VectorIndex search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Multiplier applied to `k` to get `fetch_k` when the caller doesn't specify one.
    pub fetch_k_multiplier: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            fetch_k_multiplier: 3,
        }
    }
}

/// ScriptSynth settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptSettings {
    /// LLM model used for script synthesis.
    pub model: String,
    /// Default accent style hint.
    pub accent: String,
    /// Default style hint.
    pub style: String,
    /// Default expressiveness hint.
    pub expressiveness: String,
    /// Number of leading characters of normalized source text hashed into the CacheKey.
    pub cache_key_prefix_chars: usize,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".to_string(),
            accent: "neutral".to_string(),
            style: "conversational".to_string(),
            expressiveness: "moderate".to_string(),
            cache_key_prefix_chars: 1000,
        }
    }
}

/// TTSDispatcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsSettings {
    /// Forces a single provider when set (disables fallback).
    pub forced_provider: Option<String>,
    /// Size of the TTS worker pool used for per-line fan-out.
    pub workers: usize,
    /// Per-provider call deadline in seconds.
    pub provider_timeout_s: u64,
    /// Default voice for "Speaker 1" per provider tag.
    pub gemini_voice_a: String,
    pub gemini_voice_b: String,
    pub google_voice_a: String,
    pub google_voice_b: String,
    pub edge_voice_a: String,
    pub edge_voice_b: String,
    pub hf_voice_a: String,
    pub hf_voice_b: String,
    pub offline_voice_a: String,
    pub offline_voice_b: String,
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            forced_provider: None,
            workers: 2,
            provider_timeout_s: 60,
            gemini_voice_a: "Puck".to_string(),
            gemini_voice_b: "Kore".to_string(),
            google_voice_a: "en-US-Neural2-D".to_string(),
            google_voice_b: "en-US-Neural2-F".to_string(),
            edge_voice_a: "en-US-GuyNeural".to_string(),
            edge_voice_b: "en-US-JennyNeural".to_string(),
            hf_voice_a: "default-a".to_string(),
            hf_voice_b: "default-b".to_string(),
            offline_voice_a: "default-a".to_string(),
            offline_voice_b: "default-b".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pagevoice")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Path to the persisted document library (uploaded PDFs).
    pub fn document_library_dir(&self) -> PathBuf {
        self.data_dir().join("document_library")
    }

    /// Path to the persisted audio directory (cached clips and merged artifacts).
    pub fn audio_dir(&self) -> PathBuf {
        self.data_dir().join("audio")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_round_trip_toml() {
        let settings = Settings::default();
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.embedding.dimensions, settings.embedding.dimensions);
        assert_eq!(parsed.tts.workers, settings.tts.workers);
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let settings = Settings::load_from(Some(&PathBuf::from("/nonexistent/path.toml"))).unwrap();
        assert_eq!(settings.general.bg_workers, 4);
    }
}
