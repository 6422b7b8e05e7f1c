//! TTS provider adapters. Each provider turns one line of text plus a voice
//! name into raw audio bytes in whatever format it natively produces;
//! `tts::format` normalizes the result afterward.

use crate::error::{CoreError, Result};
use crate::script::{Speaker, VoiceConfig};
use async_trait::async_trait;
use base64::Engine;
use std::process::Stdio;
use tokio::process::Command;

/// Why a provider call failed, used by the dispatcher to decide whether
/// falling through to the next provider is worth attempting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFailureKind {
    /// Missing or rejected credentials: unlikely to succeed on retry.
    Auth,
    /// Rate limited: a later provider may still succeed.
    RateLimited,
    /// Network or transport-level failure.
    Network,
    /// The provider binary/tool isn't installed.
    ToolMissing,
    /// Anything else.
    Other,
}

#[derive(Debug)]
pub struct ProviderError {
    pub kind: ProviderFailureKind,
    pub message: String,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// One backend capable of synthesizing speech for a single line of text.
#[async_trait]
pub trait TtsProvider: Send + Sync {
    /// Stable identifier used in logs, config and cache keys.
    fn name(&self) -> &'static str;

    /// Synthesize `text` spoken as `voice`, returning raw audio bytes in
    /// whatever container/codec this provider natively emits.
    async fn synthesize(&self, text: &str, voice: &str) -> std::result::Result<Vec<u8>, ProviderError>;

    /// Whether this provider can synthesize an entire multi-speaker dialogue
    /// in a single call via `synthesize_multispeaker`. Providers without
    /// native multi-speaker support fall out to per-line synthesis.
    fn supports_multispeaker(&self) -> bool {
        false
    }

    /// Synthesize a full dialogue in one call, each `(speaker, text)` line
    /// spoken with the voice `voices` assigns it. Only meaningful when
    /// `supports_multispeaker` returns `true`.
    async fn synthesize_multispeaker(
        &self,
        _lines: &[(Speaker, &str)],
        _voices: &VoiceConfig,
    ) -> std::result::Result<Vec<u8>, ProviderError> {
        Err(ProviderError {
            kind: ProviderFailureKind::Other,
            message: format!("{} does not support multi-speaker synthesis", self.name()),
        })
    }
}

/// Google's Gemini TTS models, called over the Generative Language REST API.
pub struct GeminiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model: "gemini-2.5-flash-preview-tts".to_string(),
        }
    }

    /// POST `body` to the `generateContent` endpoint and pull the inline
    /// audio payload out of the first candidate, shared between the
    /// single-voice and multi-speaker request shapes.
    async fn send(&self, body: serde_json::Value) -> std::result::Result<Vec<u8>, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError {
                kind: ProviderFailureKind::Auth,
                message: "GEMINI_API_KEY not configured".to_string(),
            });
        }

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError {
                kind: ProviderFailureKind::RateLimited,
                message: "gemini rate limited".to_string(),
            });
        }
        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ProviderError {
                kind: ProviderFailureKind::Auth,
                message: "gemini rejected credentials".to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(ProviderError {
                kind: ProviderFailureKind::Other,
                message: format!("gemini returned status {}", response.status()),
            });
        }

        let parsed: serde_json::Value = response.json().await.map_err(|e| map_reqwest_error(&e))?;
        let b64 = parsed["candidates"][0]["content"]["parts"][0]["inlineData"]["data"]
            .as_str()
            .ok_or_else(|| ProviderError {
                kind: ProviderFailureKind::Other,
                message: "gemini response missing inline audio data".to_string(),
            })?;

        base64::engine::general_purpose::STANDARD.decode(b64).map_err(|e| ProviderError {
            kind: ProviderFailureKind::Other,
            message: format!("could not decode gemini audio payload: {e}"),
        })
    }
}

#[async_trait]
impl TtsProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn synthesize(&self, text: &str, voice: &str) -> std::result::Result<Vec<u8>, ProviderError> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": text }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice } }
                }
            }
        });
        self.send(body).await
    }

    fn supports_multispeaker(&self) -> bool {
        true
    }

    async fn synthesize_multispeaker(
        &self,
        lines: &[(Speaker, &str)],
        voices: &VoiceConfig,
    ) -> std::result::Result<Vec<u8>, ProviderError> {
        if lines.is_empty() {
            return Err(ProviderError {
                kind: ProviderFailureKind::Other,
                message: "multi-speaker synthesis requires at least one line".to_string(),
            });
        }

        let transcript = lines
            .iter()
            .map(|(speaker, text)| format!("{}: {}", speaker.label(), text))
            .collect::<Vec<_>>()
            .join("\n");

        let speaker_voice_configs: Vec<serde_json::Value> = [
            (Speaker::A, &voices.speaker_a),
            (Speaker::B, &voices.speaker_b),
        ]
        .into_iter()
        .map(|(speaker, voice)| {
            serde_json::json!({
                "speaker": speaker.label(),
                "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice } }
            })
        })
        .collect();

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": transcript }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "multiSpeakerVoiceConfig": { "speakerVoiceConfigs": speaker_voice_configs }
                }
            }
        });
        self.send(body).await
    }
}

/// Google Cloud Text-to-Speech.
pub struct GoogleProvider {
    http: reqwest::Client,
    api_key: String,
}

impl GoogleProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl TtsProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn synthesize(&self, text: &str, voice: &str) -> std::result::Result<Vec<u8>, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError {
                kind: ProviderFailureKind::Auth,
                message: "GOOGLE_TTS_API_KEY not configured".to_string(),
            });
        }

        let url = format!(
            "https://texttospeech.googleapis.com/v1/text:synthesize?key={}",
            self.api_key
        );

        let language_code = voice.get(0..5).unwrap_or("en-US").to_string();
        let body = serde_json::json!({
            "input": { "text": text },
            "voice": { "languageCode": language_code, "name": voice },
            "audioConfig": { "audioEncoding": "MP3" }
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e))?;

        if !response.status().is_success() {
            return Err(classify_status(response.status(), "google"));
        }

        let parsed: serde_json::Value = response.json().await.map_err(|e| map_reqwest_error(&e))?;
        let b64 = parsed["audioContent"].as_str().ok_or_else(|| ProviderError {
            kind: ProviderFailureKind::Other,
            message: "google response missing audioContent".to_string(),
        })?;

        base64::engine::general_purpose::STANDARD.decode(b64).map_err(|e| ProviderError {
            kind: ProviderFailureKind::Other,
            message: format!("could not decode google audio payload: {e}"),
        })
    }
}

/// Microsoft Edge's neural voices via the `edge-tts` command-line tool.
pub struct EdgeProvider;

impl EdgeProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EdgeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TtsProvider for EdgeProvider {
    fn name(&self) -> &'static str {
        "edge"
    }

    async fn synthesize(&self, text: &str, voice: &str) -> std::result::Result<Vec<u8>, ProviderError> {
        let out_file = tempfile::Builder::new()
            .suffix(".mp3")
            .tempfile()
            .map_err(|e| ProviderError {
                kind: ProviderFailureKind::Other,
                message: format!("could not create temp file: {e}"),
            })?;
        let out_path = out_file.path().to_path_buf();

        let result = Command::new("edge-tts")
            .arg("--voice")
            .arg(voice)
            .arg("--text")
            .arg(text)
            .arg("--write-media")
            .arg(&out_path)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProviderError {
                    kind: ProviderFailureKind::ToolMissing,
                    message: "edge-tts not found on PATH".to_string(),
                })
            }
            Err(e) => {
                return Err(ProviderError {
                    kind: ProviderFailureKind::Other,
                    message: format!("edge-tts execution failed: {e}"),
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError {
                kind: ProviderFailureKind::Other,
                message: format!("edge-tts failed: {stderr}"),
            });
        }

        std::fs::read(&out_path).map_err(|e| ProviderError {
            kind: ProviderFailureKind::Other,
            message: format!("could not read edge-tts output: {e}"),
        })
    }
}

/// A Hugging Face Inference API TTS model.
pub struct HfProvider {
    http: reqwest::Client,
    api_token: String,
    model: String,
}

impl HfProvider {
    pub fn new(api_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_token,
            model: "espnet/kan-bayashi_ljspeech_vits".to_string(),
        }
    }
}

#[async_trait]
impl TtsProvider for HfProvider {
    fn name(&self) -> &'static str {
        "huggingface"
    }

    async fn synthesize(&self, text: &str, _voice: &str) -> std::result::Result<Vec<u8>, ProviderError> {
        if self.api_token.is_empty() {
            return Err(ProviderError {
                kind: ProviderFailureKind::Auth,
                message: "HF_API_TOKEN not configured".to_string(),
            });
        }

        let url = format!("https://api-inference.huggingface.co/models/{}", self.model);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&serde_json::json!({ "inputs": text }))
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e))?;

        if !response.status().is_success() {
            return Err(classify_status(response.status(), "huggingface"));
        }

        response.bytes().await.map(|b| b.to_vec()).map_err(|e| map_reqwest_error(&e))
    }
}

/// Local fallback provider using `espeak-ng`, always available as a last
/// resort so the dispatcher has a provider chain that terminates in
/// something that doesn't depend on network credentials.
pub struct OfflineProvider;

impl OfflineProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OfflineProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TtsProvider for OfflineProvider {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn synthesize(&self, text: &str, _voice: &str) -> std::result::Result<Vec<u8>, ProviderError> {
        let out_file = tempfile::Builder::new()
            .suffix(".wav")
            .tempfile()
            .map_err(|e| ProviderError {
                kind: ProviderFailureKind::Other,
                message: format!("could not create temp file: {e}"),
            })?;
        let out_path = out_file.path().to_path_buf();

        let result = Command::new("espeak-ng")
            .arg("-w")
            .arg(&out_path)
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProviderError {
                    kind: ProviderFailureKind::ToolMissing,
                    message: "espeak-ng not found on PATH".to_string(),
                })
            }
            Err(e) => {
                return Err(ProviderError {
                    kind: ProviderFailureKind::Other,
                    message: format!("espeak-ng execution failed: {e}"),
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError {
                kind: ProviderFailureKind::Other,
                message: format!("espeak-ng failed: {stderr}"),
            });
        }

        std::fs::read(&out_path).map_err(|e| ProviderError {
            kind: ProviderFailureKind::Other,
            message: format!("could not read espeak-ng output: {e}"),
        })
    }
}

fn classify_status(status: reqwest::StatusCode, provider: &str) -> ProviderError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        ProviderError {
            kind: ProviderFailureKind::RateLimited,
            message: format!("{provider} rate limited"),
        }
    } else if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        ProviderError {
            kind: ProviderFailureKind::Auth,
            message: format!("{provider} rejected credentials"),
        }
    } else {
        ProviderError {
            kind: ProviderFailureKind::Other,
            message: format!("{provider} returned status {status}"),
        }
    }
}

fn map_reqwest_error(e: &reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError {
            kind: ProviderFailureKind::Network,
            message: format!("request timed out: {e}"),
        }
    } else {
        ProviderError {
            kind: ProviderFailureKind::Network,
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError {
            kind: ProviderFailureKind::Auth,
            message: "bad key".to_string(),
        };
        assert!(format!("{err}").contains("bad key"));
    }
}
