//! Configuration module.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{InsightsPrompts, Prompts, ScriptPrompts};
pub use settings::{
    EmbeddingSettings, GeneralSettings, IndexSettings, IngestSettings, PromptSettings,
    ScriptSettings, ServerSettings, Settings, TtsSettings,
};
