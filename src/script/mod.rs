//! C4: script synthesis — turns retrieved chunks into narration or dialogue.

mod cache;
mod parse;
mod synth;
mod types;

pub use synth::{ScriptMode, ScriptStyle, ScriptSynth};
pub use types::{CacheKey, DialogueLine, Script, Speaker, VoiceConfig};
