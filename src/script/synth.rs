//! C4: ScriptSynth — turns retrieved chunks into a `Script`, with caching.

use crate::config::{Prompts, ScriptSettings};
use crate::error::{CoreError, Result};
use crate::retrieval::Chunk;
use crate::script::cache::ScriptCache;
use crate::script::parse::parse_dialogue;
use crate::script::types::{CacheKey, Script};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Which shape of script to synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptMode {
    Narration,
    Dialogue,
}

/// Per-request overrides for the synthesis style hints. `None` falls back
/// to the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct ScriptStyle {
    pub accent: Option<String>,
    pub style: Option<String>,
    pub expressiveness: Option<String>,
}

pub struct ScriptSynth {
    client: Client<OpenAIConfig>,
    settings: ScriptSettings,
    prompts: Prompts,
    cache: ScriptCache,
}

impl ScriptSynth {
    pub fn new(client: Client<OpenAIConfig>, settings: ScriptSettings, prompts: Prompts) -> Self {
        Self {
            client,
            settings,
            prompts,
            cache: ScriptCache::new(),
        }
    }

    /// Build the deterministic cache key for a synthesis request. The
    /// source text is bounded to `cache_key_prefix_chars` so very long
    /// documents don't blow up the key derivation, while remaining stable
    /// across runs for identical input chunks.
    fn cache_key(&self, chunks: &[Chunk], mode: ScriptMode, style: &ScriptStyle) -> CacheKey {
        let mode_str = match mode {
            ScriptMode::Narration => "narration",
            ScriptMode::Dialogue => "dialogue",
        };
        let accent = style.accent.as_deref().unwrap_or(&self.settings.accent);
        let style_hint = style.style.as_deref().unwrap_or(&self.settings.style);
        let expressiveness = style
            .expressiveness
            .as_deref()
            .unwrap_or(&self.settings.expressiveness);

        let mut source = String::new();
        for chunk in chunks {
            source.push_str(&chunk.filename);
            source.push(':');
            source.push_str(&chunk.page_number.to_string());
            source.push(':');
            source.push_str(&chunk.text);
            source.push('\n');
        }
        let prefix: String = source.chars().take(self.settings.cache_key_prefix_chars).collect();

        CacheKey::from_fields(&[
            &self.settings.model,
            mode_str,
            accent,
            style_hint,
            expressiveness,
            &prefix,
        ])
    }

    /// Synthesize (or fetch from cache) a script covering the given chunks.
    pub async fn synthesize(
        &self,
        chunks: &[Chunk],
        mode: ScriptMode,
        style: &ScriptStyle,
    ) -> Result<Script> {
        if chunks.is_empty() {
            return Err(CoreError::InvalidRequest(
                "no chunks supplied for script synthesis".to_string(),
            ));
        }

        let key = self.cache_key(chunks, mode, style);
        if let Some(cached) = self.cache.get(&key).await {
            debug!(cache_key = %key, "script cache hit");
            return Ok(cached);
        }

        let script = self.synthesize_uncached(chunks, mode, style).await?;
        self.cache.insert(key, script.clone()).await;
        Ok(script)
    }

    async fn synthesize_uncached(
        &self,
        chunks: &[Chunk],
        mode: ScriptMode,
        style: &ScriptStyle,
    ) -> Result<Script> {
        let source_text = chunks
            .iter()
            .map(|c| format!("[{} p.{}] {}", c.filename, c.page_number, c.text))
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut vars = HashMap::new();
        vars.insert("source_text".to_string(), source_text);
        vars.insert(
            "accent".to_string(),
            style.accent.clone().unwrap_or_else(|| self.settings.accent.clone()),
        );
        vars.insert(
            "style".to_string(),
            style.style.clone().unwrap_or_else(|| self.settings.style.clone()),
        );
        vars.insert(
            "expressiveness".to_string(),
            style
                .expressiveness
                .clone()
                .unwrap_or_else(|| self.settings.expressiveness.clone()),
        );

        let (system_template, user_template) = match mode {
            ScriptMode::Narration => (
                &self.prompts.script.narration_system,
                &self.prompts.script.narration_user,
            ),
            ScriptMode::Dialogue => (
                &self.prompts.script.dialogue_system,
                &self.prompts.script.dialogue_user,
            ),
        };

        let system_message = self.prompts.render_with_custom(system_template, &vars);
        let user_message = self.prompts.render_with_custom(user_template, &vars);

        let response_text = self.call_llm(&system_message, &user_message).await?;

        match mode {
            ScriptMode::Narration => {
                if response_text.trim().is_empty() {
                    return Err(CoreError::ScriptSynthFailed {
                        reason: "LLM returned empty narration".to_string(),
                        malformed: true,
                    });
                }
                Ok(Script::Narration(response_text))
            }
            ScriptMode::Dialogue => match parse_dialogue(&response_text) {
                Ok(lines) => Ok(Script::Dialogue(lines)),
                Err(e) => {
                    warn!(error = %e, "dialogue parse failed, retrying once with stricter prompt");
                    let retry_user = format!(
                        "{user_message}\n\nYour previous response did not follow the required \"Speaker 1:\"/\"Speaker 2:\" line format. Follow it exactly this time."
                    );
                    let retry_text = self.call_llm(&system_message, &retry_user).await?;
                    let lines = parse_dialogue(&retry_text)?;
                    Ok(Script::Dialogue(lines))
                }
            },
        }
    }

    async fn call_llm(&self, system_message: &str, user_message: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_message.to_string())
                .build()
                .map_err(|e| CoreError::OpenAI(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_message.to_string())
                .build()
                .map_err(|e| CoreError::OpenAI(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.settings.model)
            .messages(messages)
            .temperature(0.5)
            .build()
            .map_err(|e| CoreError::OpenAI(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| CoreError::OpenAI(format!("script synthesis call failed: {e}")))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| CoreError::ScriptSynthFailed {
                reason: "empty response from LLM".to_string(),
                malformed: false,
            })?;

        info!(chars = content.len(), "received script synthesis response");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunks() -> Vec<Chunk> {
        vec![Chunk::new(
            "The quick brown fox.".to_string(),
            "a.pdf".to_string(),
            1,
            0,
            None,
        )]
    }

    #[test]
    fn test_cache_key_stable_for_identical_input() {
        let synth = ScriptSynth::new(
            crate::openai::create_client(),
            ScriptSettings::default(),
            Prompts::default(),
        );
        let style = ScriptStyle::default();
        let k1 = synth.cache_key(&sample_chunks(), ScriptMode::Narration, &style);
        let k2 = synth.cache_key(&sample_chunks(), ScriptMode::Narration, &style);
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_cache_key_differs_by_mode() {
        let synth = ScriptSynth::new(
            crate::openai::create_client(),
            ScriptSettings::default(),
            Prompts::default(),
        );
        let style = ScriptStyle::default();
        let k1 = synth.cache_key(&sample_chunks(), ScriptMode::Narration, &style);
        let k2 = synth.cache_key(&sample_chunks(), ScriptMode::Dialogue, &style);
        assert_ne!(k1, k2);
    }
}
