//! GenerateAudio command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::{CliScriptMode, Output};
use crate::config::{Settings, TtsSettings};
use crate::pipeline::{AudioSource, GenerateAudioRequest, Pipeline};
use crate::script::VoiceConfig;
use anyhow::Result;
use std::collections::HashMap;

/// Run the generate-audio command.
#[allow(clippy::too_many_arguments)]
pub async fn run_generate_audio(
    filename: &str,
    mode: CliScriptMode,
    style: Option<String>,
    accent: Option<String>,
    expressiveness: Option<String>,
    speaker_voice: Vec<(String, String)>,
    settings: Settings,
) -> Result<()> {
    preflight::check(Operation::GenerateAudio)?;

    let tts_warnings = preflight::check_tts_providers(&settings.tts);
    for warning in &tts_warnings {
        Output::warning(warning);
    }

    let accent = accent.or_else(|| Some(settings.script.accent.clone()));
    let style = style.or_else(|| Some(settings.script.style.clone()));
    let expressiveness = expressiveness.or_else(|| Some(settings.script.expressiveness.clone()));

    let voices = resolve_voices(&settings.tts);
    let speakers_override: Option<HashMap<String, String>> = if speaker_voice.is_empty() {
        None
    } else {
        Some(speaker_voice.into_iter().collect())
    };

    let pipeline = Pipeline::from_settings(settings).await?;
    let spinner = Output::spinner("Generating audio (this can take a while)...");

    let result = pipeline
        .generate_audio(GenerateAudioRequest {
            source: AudioSource::Document {
                filename: filename.to_string(),
            },
            podcast: mode == CliScriptMode::Dialogue,
            two_speakers: false,
            accent,
            style,
            expressiveness,
            voices,
            speakers_override,
        })
        .await;

    spinner.finish_and_clear();

    match result {
        Ok(artifact) => {
            Output::success(&format!("Generated {}", artifact.path.display()));
            Output::kv("Duration", &format!("{:.1}s", artifact.duration_seconds));
            Output::kv("Chapters", &artifact.chapters.len().to_string());
            if artifact.degraded {
                Output::warning("Concatenation failed; artifact is the first clip only.");
            }
            for chapter in &artifact.chapters {
                let title = chapter.title.as_deref().unwrap_or("(untitled)");
                Output::list_item(&format!(
                    "{:.1}s - {:.1}s  {}",
                    chapter.start_seconds, chapter.end_seconds, title
                ));
            }
        }
        Err(e) => {
            Output::error(&format!("Audio generation failed: {}", e));
            return Err(anyhow::anyhow!("{}", e));
        }
    }

    Ok(())
}

/// Pick a voice pair for the forced provider if one is set, otherwise the
/// first provider in the dispatcher's natural chain (gemini).
fn resolve_voices(tts: &TtsSettings) -> VoiceConfig {
    let provider = tts.forced_provider.as_deref().unwrap_or("gemini");
    let (speaker_a, speaker_b) = match provider {
        "google" => (tts.google_voice_a.clone(), tts.google_voice_b.clone()),
        "edge" => (tts.edge_voice_a.clone(), tts.edge_voice_b.clone()),
        "huggingface" => (tts.hf_voice_a.clone(), tts.hf_voice_b.clone()),
        "offline" => (tts.offline_voice_a.clone(), tts.offline_voice_b.clone()),
        _ => (tts.gemini_voice_a.clone(), tts.gemini_voice_b.clone()),
    };
    VoiceConfig { speaker_a, speaker_b }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_voices_defaults_to_gemini() {
        let tts = TtsSettings::default();
        let voices = resolve_voices(&tts);
        assert_eq!(voices.speaker_a, tts.gemini_voice_a);
    }

    #[test]
    fn test_resolve_voices_honors_forced_provider() {
        let mut tts = TtsSettings::default();
        tts.forced_provider = Some("offline".to_string());
        let voices = resolve_voices(&tts);
        assert_eq!(voices.speaker_a, tts.offline_voice_a);
    }
}
