//! C6: Muxer — concatenates synthesized clips into one audio artifact with
//! chapter markers, grounded on the teacher's ffmpeg segment-extraction
//! idiom inverted into concatenation.

use crate::error::{CoreError, Result};
use crate::tts::probe_duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

/// One chapter marker in the final artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub title: Option<String>,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

/// The final generated audio artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub chapters: Vec<Chapter>,
    /// True when concatenation failed and the caller was handed the
    /// individual clips instead of a single merged file.
    pub degraded: bool,
}

pub struct Muxer {
    scratch_dir: PathBuf,
}

impl Muxer {
    pub fn new(scratch_dir: PathBuf) -> Self {
        Self { scratch_dir }
    }

    /// Concatenate `clips` in order into `dest`, computing chapter markers
    /// from each clip's probed duration. `chapter_titles` (same length as
    /// `clips`, or empty) provides an optional title per clip.
    pub async fn mux(
        &self,
        clips: &[PathBuf],
        dest: &Path,
        chapter_titles: &[Option<String>],
    ) -> Result<AudioArtifact> {
        if clips.is_empty() {
            return Err(CoreError::InvalidRequest("no clips to mux".to_string()));
        }

        let mut durations = Vec::with_capacity(clips.len());
        for clip in clips {
            durations.push(probe_duration(clip).await?);
        }

        let mut chapters = Vec::with_capacity(clips.len());
        let mut cursor = 0.0;
        for (i, duration) in durations.iter().enumerate() {
            let title = chapter_titles.get(i).cloned().flatten();
            chapters.push(Chapter {
                title,
                start_seconds: cursor,
                end_seconds: cursor + duration,
            });
            cursor += duration;
        }

        match self.concat(clips, dest).await {
            Ok(()) => Ok(AudioArtifact {
                path: dest.to_path_buf(),
                duration_seconds: cursor,
                chapters,
                degraded: false,
            }),
            Err(e) => {
                warn!(error = %e, "concatenation failed, falling back to individual clips");
                Ok(AudioArtifact {
                    path: clips[0].clone(),
                    duration_seconds: cursor,
                    chapters,
                    degraded: true,
                })
            }
        }
    }

    async fn concat(&self, clips: &[PathBuf], dest: &Path) -> Result<()> {
        std::fs::create_dir_all(&self.scratch_dir)?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let list_path = self.scratch_dir.join(format!("{}.txt", uuid::Uuid::new_v4()));
        let mut list_contents = String::new();
        for clip in clips {
            let escaped = clip.to_string_lossy().replace('\'', "'\\''");
            list_contents.push_str(&format!("file '{escaped}'\n"));
        }
        std::fs::write(&list_path, list_contents)?;

        let result = Command::new("ffmpeg")
            .arg("-f")
            .arg("concat")
            .arg("-safe")
            .arg("0")
            .arg("-i")
            .arg(&list_path)
            .arg("-c")
            .arg("copy")
            .arg("-y")
            .arg("-loglevel")
            .arg("error")
            .arg(dest)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        let _ = std::fs::remove_file(&list_path);

        match result {
            Ok(out) if out.status.success() => {
                info!(dest = %dest.display(), clip_count = clips.len(), "muxed audio artifact");
                Ok(())
            }
            Ok(out) => {
                let err = String::from_utf8_lossy(&out.stderr);
                Err(CoreError::ToolFailed(format!("ffmpeg concat failed: {err}")))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CoreError::ToolNotFound("ffmpeg".to_string())),
            Err(e) => Err(CoreError::ToolFailed(format!("ffmpeg error: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_computation_contiguous() {
        let chapters = vec![
            Chapter {
                title: Some("Intro".to_string()),
                start_seconds: 0.0,
                end_seconds: 10.0,
            },
            Chapter {
                title: Some("Body".to_string()),
                start_seconds: 10.0,
                end_seconds: 25.0,
            },
        ];
        for pair in chapters.windows(2) {
            assert_eq!(pair[0].end_seconds, pair[1].start_seconds);
        }
    }
}
