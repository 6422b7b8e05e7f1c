//! Parses the LLM's raw dialogue response into `DialogueLine`s.

use crate::error::{CoreError, Result};
use crate::script::types::{DialogueLine, Speaker};
use regex::Regex;
use std::sync::OnceLock;

static SPEAKER_PREFIX: OnceLock<Regex> = OnceLock::new();

fn speaker_prefix_re() -> &'static Regex {
    SPEAKER_PREFIX.get_or_init(|| {
        Regex::new(r"(?i)^(Speaker\s*(?:1|2|A|B)|Alex|Jordan|A|B)\s*:\s*(.+)$").expect("static regex is valid")
    })
}

/// Parse a dialogue response where each turn is prefixed with a recognized
/// speaker label (`Speaker 1`/`Speaker 2`, or the aliases `Alex`/`Jordan`/
/// `A`/`B`/`Speaker A`/`Speaker B`). Blank lines are skipped. A non-empty
/// line with no recognized prefix is treated as a continuation of the
/// previous line, unless no line has been established yet, in which case
/// it is discarded.
pub fn parse_dialogue(response: &str) -> Result<Vec<DialogueLine>> {
    let mut lines: Vec<DialogueLine> = Vec::new();

    for raw_line in response.lines() {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match split_speaker_prefix(trimmed) {
            Some((speaker, text)) if !text.is_empty() => {
                lines.push(DialogueLine {
                    speaker,
                    text: text.to_string(),
                });
            }
            Some(_) => {}
            None => {
                if let Some(last) = lines.last_mut() {
                    last.text.push(' ');
                    last.text.push_str(trimmed);
                }
            }
        }
    }

    if lines.is_empty() {
        return Err(CoreError::ScriptSynthFailed {
            reason: "no recognizable dialogue lines in LLM response".to_string(),
            malformed: true,
        });
    }

    let distinct: std::collections::HashSet<Speaker> = lines.iter().map(|l| l.speaker).collect();
    if distinct.len() < 2 {
        return Err(CoreError::ScriptSynthFailed {
            reason: "dialogue response used only one speaker".to_string(),
            malformed: true,
        });
    }

    Ok(lines)
}

/// Recognize a speaker-label prefix, case-insensitive, with or without a
/// leading markdown bullet or bold marker.
fn split_speaker_prefix(line: &str) -> Option<(Speaker, &str)> {
    let stripped = line.trim_start_matches(['-', '*', ' ']).trim_start_matches("**");
    let caps = speaker_prefix_re().captures(stripped)?;
    let speaker = Speaker::from_label_alias(caps.get(1)?.as_str())?;
    let rest = caps.get(2)?.as_str().trim_start_matches("**").trim();
    Some((speaker, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_dialogue() {
        let response = "Speaker 1: Hello there.\nSpeaker 2: Hi, how are you?\nSpeaker 1: Doing well.";
        let lines = parse_dialogue(response).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].speaker, Speaker::A);
        assert_eq!(lines[1].speaker, Speaker::B);
        assert_eq!(lines[0].text, "Hello there.");
    }

    #[test]
    fn test_parse_skips_blank_and_unlabeled_lines() {
        let response = "Intro text with no label.\n\nSpeaker 1: Real line.\nSpeaker 2: Another.";
        let lines = parse_dialogue(response).unwrap();
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_parse_markdown_bold_prefix() {
        let response = "**Speaker 1:** Bold hello.\n**Speaker 2:** Bold reply.";
        let lines = parse_dialogue(response).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Bold hello.");
    }

    #[test]
    fn test_parse_rejects_single_speaker() {
        let response = "Speaker 1: Only one.\nSpeaker 1: Still one.";
        assert!(parse_dialogue(response).is_err());
    }

    #[test]
    fn test_parse_rejects_empty_response() {
        assert!(parse_dialogue("").is_err());
    }

    #[test]
    fn test_parse_appends_continuation_lines() {
        let response = "Speaker 1: Hello there,\nkeep going.\nSpeaker 2: Got it.";
        let lines = parse_dialogue(response).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Hello there, keep going.");
    }

    #[test]
    fn test_parse_recognizes_alias_labels() {
        let response = "Alex: Hi.\nJordan: Hello back.\nSpeaker A: Again.";
        let lines = parse_dialogue(response).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].speaker, Speaker::A);
        assert_eq!(lines[1].speaker, Speaker::B);
        assert_eq!(lines[2].speaker, Speaker::A);
    }
}
