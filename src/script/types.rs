//! Script data types: the output of C4 and the input to C5.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Which of the two dialogue voices a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    A,
    B,
}

impl Speaker {
    /// The canonical label used in prompts, multi-speaker TTS requests and
    /// chapter titles.
    pub fn label(self) -> &'static str {
        match self {
            Speaker::A => "Speaker 1",
            Speaker::B => "Speaker 2",
        }
    }

    /// Recognize a speaker label or alias (`Speaker 1`/`Speaker A`/`Alex`/`A`
    /// for the first speaker, `Speaker 2`/`Speaker B`/`Jordan`/`B` for the
    /// second), case- and whitespace-insensitive.
    pub fn from_label_alias(label: &str) -> Option<Speaker> {
        let normalized: String = label.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase();
        match normalized.as_str() {
            "speaker1" | "speakera" | "alex" | "a" => Some(Speaker::A),
            "speaker2" | "speakerb" | "jordan" | "b" => Some(Speaker::B),
            _ => None,
        }
    }
}

/// One turn in a two-speaker dialogue script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueLine {
    pub speaker: Speaker,
    pub text: String,
}

/// The synthesized script for an audio request: either a single flowing
/// narration or an alternating two-speaker dialogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Script {
    Narration(String),
    Dialogue(Vec<DialogueLine>),
}

impl Script {
    /// Flatten the script into an ordered sequence of (speaker, text)
    /// synthesis units. Narration has a single unit with no speaker.
    pub fn units(&self) -> Vec<(Option<Speaker>, &str)> {
        match self {
            Script::Narration(text) => vec![(None, text.as_str())],
            Script::Dialogue(lines) => lines
                .iter()
                .map(|l| (Some(l.speaker), l.text.as_str()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Script::Narration(text) => text.trim().is_empty(),
            Script::Dialogue(lines) => lines.is_empty(),
        }
    }

    /// The set of distinct speakers present. Narration always yields an
    /// empty set; dialogue must use exactly `{A, B}`.
    pub fn speaker_set(&self) -> std::collections::HashSet<Speaker> {
        match self {
            Script::Narration(_) => std::collections::HashSet::new(),
            Script::Dialogue(lines) => lines.iter().map(|l| l.speaker).collect(),
        }
    }
}

/// Per-provider voice assignment for the two dialogue speakers (or the
/// single narration voice, stored in `speaker_a`).
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub speaker_a: String,
    pub speaker_b: String,
}

/// A deterministic content-addressed key identifying a cached artifact.
///
/// Used both for the script cache (C4) and the per-clip TTS cache (C5):
/// identical inputs always hash to the same key, so the disk filename
/// doubles as the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a key from an ordered list of fields. Fields are joined with a
    /// separator byte that cannot appear in any single field's own content
    /// once hashed, so field boundaries can't be confused.
    pub fn from_fields(fields: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        for field in fields {
            hasher.update(field.as_bytes());
            hasher.update([0u8]);
        }
        CacheKey(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_deterministic() {
        let a = CacheKey::from_fields(&["hello", "world"]);
        let b = CacheKey::from_fields(&["hello", "world"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_cache_key_sensitive_to_field_boundaries() {
        // "he" + "llo" must differ from "hel" + "lo" despite equal concatenation.
        let a = CacheKey::from_fields(&["he", "llo"]);
        let b = CacheKey::from_fields(&["hel", "lo"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_script_speaker_set() {
        let script = Script::Dialogue(vec![
            DialogueLine {
                speaker: Speaker::A,
                text: "hi".to_string(),
            },
            DialogueLine {
                speaker: Speaker::B,
                text: "hello".to_string(),
            },
        ]);
        let set = script.speaker_set();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_narration_units() {
        let script = Script::Narration("one flowing text".to_string());
        let units = script.units();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].0, None);
    }
}
