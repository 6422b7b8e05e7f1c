//! C5: TTSDispatcher — turns a `Script` into an ordered sequence of audio
//! clips, fanning synthesis out across a bounded worker pool and falling
//! back across providers in order.
//!
//! Concurrency pattern (bounded fan-out, ordered reassembly via an index
//! carried alongside each future) is grounded on the teacher's transcript
//! fan-out over `buffer_unordered` with a final `sort_by_key`.

use crate::error::{CoreError, Result};
use crate::script::{CacheKey, Script, Speaker, VoiceConfig};
use crate::tts::format::normalize_clip;
use crate::tts::provider::{ProviderFailureKind, TtsProvider};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub struct TTSDispatcher {
    providers: Vec<Arc<dyn TtsProvider>>,
    forced_provider: Option<String>,
    workers: usize,
    clip_cache_dir: PathBuf,
    scratch_dir: PathBuf,
    provider_timeout: std::time::Duration,
}

impl TTSDispatcher {
    pub fn new(
        providers: Vec<Arc<dyn TtsProvider>>,
        forced_provider: Option<String>,
        workers: usize,
        clip_cache_dir: PathBuf,
        scratch_dir: PathBuf,
        provider_timeout_s: u64,
    ) -> Self {
        Self {
            providers,
            forced_provider,
            workers: workers.max(1),
            clip_cache_dir,
            scratch_dir,
            provider_timeout: std::time::Duration::from_secs(provider_timeout_s),
        }
    }

    /// The ordered provider chain to try for one synthesis unit, honoring
    /// a forced provider by filtering the chain down to just that one.
    fn provider_chain(&self) -> Vec<Arc<dyn TtsProvider>> {
        match &self.forced_provider {
            Some(name) => self
                .providers
                .iter()
                .filter(|p| p.name() == name)
                .cloned()
                .collect(),
            None => self.providers.clone(),
        }
    }

    /// Synthesize every unit of `script` into a cached, normalized MP3 clip,
    /// returning clip paths in script order. If `script` is a `Dialogue` and
    /// the preferred provider supports multi-speaker synthesis, the whole
    /// dialogue is synthesized in one call instead of fanning out per line
    /// (the caller can tell which happened by comparing the returned clip
    /// count to the number of dialogue lines).
    pub async fn synthesize_script(
        &self,
        script: &Script,
        voices: &VoiceConfig,
        script_cache_key: &CacheKey,
        style_tag: &str,
    ) -> Result<Vec<PathBuf>> {
        if script.is_empty() {
            return Err(CoreError::InvalidRequest("script has no synthesis units".to_string()));
        }

        if let Script::Dialogue(dialogue_lines) = script {
            if let Some(provider) = self.provider_chain().into_iter().next() {
                if provider.supports_multispeaker() {
                    let clip = self
                        .synthesize_dialogue_one_call(dialogue_lines, voices, script_cache_key, style_tag, provider)
                        .await?;
                    return Ok(vec![clip]);
                }
            }
        }

        let units = script.units();
        let indexed: Vec<(usize, Option<Speaker>, String)> = units
            .into_iter()
            .enumerate()
            .map(|(i, (speaker, text))| (i, speaker, text.to_string()))
            .collect();

        let mut results: Vec<(usize, PathBuf)> = stream::iter(indexed)
            .map(|(idx, speaker, text)| {
                let voice = match speaker {
                    Some(Speaker::A) | None => voices.speaker_a.clone(),
                    Some(Speaker::B) => voices.speaker_b.clone(),
                };
                let key = CacheKey::from_fields(&[
                    script_cache_key.as_str(),
                    &idx.to_string(),
                    &voice,
                    style_tag,
                ]);
                async move {
                    let clip = self.synthesize_line(&text, &voice, &key).await;
                    (idx, clip)
                }
            })
            .buffer_unordered(self.workers)
            .map(|(idx, result)| result.map(|path| (idx, path)))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        results.sort_by_key(|(idx, _)| *idx);
        Ok(results.into_iter().map(|(_, path)| path).collect())
    }

    /// Synthesize an entire dialogue in a single call via a provider that
    /// supports it natively, rather than fanning out per line.
    async fn synthesize_dialogue_one_call(
        &self,
        lines: &[crate::script::DialogueLine],
        voices: &VoiceConfig,
        script_cache_key: &CacheKey,
        style_tag: &str,
        provider: Arc<dyn TtsProvider>,
    ) -> Result<PathBuf> {
        let key = CacheKey::from_fields(&[
            script_cache_key.as_str(),
            &voices.speaker_a,
            &voices.speaker_b,
            provider.name(),
            style_tag,
        ]);
        let dest = self.clip_cache_dir.join(format!("{}-{}.mp3", provider.name(), key.as_str()));
        if dest.exists() {
            return Ok(dest);
        }

        let pairs: Vec<(Speaker, &str)> = lines.iter().map(|l| (l.speaker, l.text.as_str())).collect();
        let attempt = tokio::time::timeout(self.provider_timeout, provider.synthesize_multispeaker(&pairs, voices)).await;
        match attempt {
            Ok(Ok(raw)) => {
                info!(provider = provider.name(), "multi-speaker tts synthesis succeeded");
                normalize_clip(&raw, &dest, &self.scratch_dir).await
            }
            Ok(Err(e)) => {
                warn!(provider = provider.name(), error = %e, "multi-speaker tts synthesis failed");
                Err(CoreError::AllProvidersFailed)
            }
            Err(_) => {
                warn!(provider = provider.name(), "multi-speaker tts synthesis timed out");
                Err(CoreError::AllProvidersFailed)
            }
        }
    }

    /// Synthesize (or reuse a cached clip for) a single line of text,
    /// trying each provider in the configured chain until one succeeds.
    /// `key` must already incorporate the voice and style; the provider tag
    /// is folded into the on-disk filename so clips from different
    /// providers in the chain never collide.
    async fn synthesize_line(&self, text: &str, voice: &str, key: &CacheKey) -> Result<PathBuf> {
        let chain = self.provider_chain();
        if chain.is_empty() {
            return Err(CoreError::AllProvidersFailed);
        }

        let mut last_kind = ProviderFailureKind::Other;
        for provider in &chain {
            let full_key = CacheKey::from_fields(&[key.as_str(), provider.name()]);
            let dest = self.clip_cache_dir.join(format!("{}-{}.mp3", provider.name(), full_key.as_str()));
            if dest.exists() {
                return Ok(dest);
            }

            let attempt = tokio::time::timeout(self.provider_timeout, provider.synthesize(text, voice)).await;
            match attempt {
                Ok(Ok(raw)) => {
                    info!(provider = provider.name(), "tts synthesis succeeded");
                    return normalize_clip(&raw, &dest, &self.scratch_dir).await;
                }
                Ok(Err(e)) => {
                    warn!(provider = provider.name(), error = %e, "tts provider failed, trying next");
                    last_kind = e.kind;
                }
                Err(_) => {
                    warn!(provider = provider.name(), "tts provider timed out, trying next");
                    last_kind = ProviderFailureKind::Network;
                }
            }
        }

        let _ = last_kind;
        Err(CoreError::AllProvidersFailed)
    }
}

/// Concatenation order for a set of already-synthesized clips, used by the
/// muxer. Kept here rather than in `mux` because clip ordering is a
/// property of the dispatch, not the mux step.
pub fn clip_order(paths: &[PathBuf]) -> Vec<&Path> {
    paths.iter().map(|p| p.as_path()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::provider::ProviderError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyProvider {
        name: &'static str,
        fail_calls: AtomicUsize,
    }

    #[async_trait]
    impl TtsProvider for FlakyProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn synthesize(&self, _text: &str, _voice: &str) -> std::result::Result<Vec<u8>, ProviderError> {
            self.fail_calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError {
                kind: ProviderFailureKind::Auth,
                message: "no credentials".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_provider_chain_respects_forced_provider() {
        let providers: Vec<Arc<dyn TtsProvider>> = vec![
            Arc::new(FlakyProvider {
                name: "gemini",
                fail_calls: AtomicUsize::new(0),
            }),
            Arc::new(FlakyProvider {
                name: "offline",
                fail_calls: AtomicUsize::new(0),
            }),
        ];
        let dispatcher = TTSDispatcher::new(
            providers,
            Some("offline".to_string()),
            2,
            PathBuf::from("/tmp/pagevoice-test-clips"),
            PathBuf::from("/tmp/pagevoice-test-scratch"),
            60,
        );
        let chain = dispatcher.provider_chain();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].name(), "offline");
    }

    struct MultiSpeakerProvider;

    #[async_trait]
    impl TtsProvider for MultiSpeakerProvider {
        fn name(&self) -> &'static str {
            "multispeaker-fake"
        }

        async fn synthesize(&self, _text: &str, _voice: &str) -> std::result::Result<Vec<u8>, ProviderError> {
            Err(ProviderError {
                kind: ProviderFailureKind::Other,
                message: "single-line synthesis not used in this test".to_string(),
            })
        }

        fn supports_multispeaker(&self) -> bool {
            true
        }

        async fn synthesize_multispeaker(
            &self,
            lines: &[(Speaker, &str)],
            _voices: &VoiceConfig,
        ) -> std::result::Result<Vec<u8>, ProviderError> {
            assert_eq!(lines.len(), 2);
            Err(ProviderError {
                kind: ProviderFailureKind::Other,
                message: "fake provider always fails after asserting the call shape".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_dialogue_prefers_one_call_multispeaker_provider() {
        use crate::script::DialogueLine;

        let providers: Vec<Arc<dyn TtsProvider>> = vec![Arc::new(MultiSpeakerProvider)];
        let dispatcher = TTSDispatcher::new(
            providers,
            None,
            2,
            PathBuf::from("/tmp/pagevoice-test-clips-3"),
            PathBuf::from("/tmp/pagevoice-test-scratch-3"),
            60,
        );

        let script = Script::Dialogue(vec![
            DialogueLine {
                speaker: Speaker::A,
                text: "Hi there.".to_string(),
            },
            DialogueLine {
                speaker: Speaker::B,
                text: "Hello back.".to_string(),
            },
        ]);
        let voices = VoiceConfig {
            speaker_a: "voice-a".to_string(),
            speaker_b: "voice-b".to_string(),
        };
        let key = CacheKey::from_fields(&["dialogue-test"]);

        // The fake provider's synthesize_multispeaker asserts it was called
        // with both lines in one shot, then fails; a per-line fan-out would
        // instead call `synthesize` and fail differently.
        let result = dispatcher.synthesize_script(&script, &voices, &key, "default").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_all_providers_failing_returns_error() {
        let providers: Vec<Arc<dyn TtsProvider>> = vec![Arc::new(FlakyProvider {
            name: "gemini",
            fail_calls: AtomicUsize::new(0),
        })];
        let dispatcher = TTSDispatcher::new(
            providers,
            None,
            1,
            PathBuf::from("/tmp/pagevoice-test-clips-2"),
            PathBuf::from("/tmp/pagevoice-test-scratch-2"),
            60,
        );
        let key = CacheKey::from_fields(&["x"]);
        let result = dispatcher.synthesize_line("hello", "voice-a", &key).await;
        assert!(result.is_err());
    }
}
