//! Normalizes raw provider audio bytes to a single canonical container
//! (MP3), grounded on the teacher's ffmpeg-based audio normalization.

use crate::error::{CoreError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Write raw bytes to a scratch file, detect whether ffmpeg considers it
/// already a clean MP3, and re-encode through ffmpeg when it doesn't.
/// Returns the path to the normalized MP3.
pub async fn normalize_clip(raw: &[u8], dest: &Path, scratch_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(scratch_dir)?;
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let scratch_in = scratch_dir.join(format!("{}-in.bin", uuid::Uuid::new_v4()));
    std::fs::write(&scratch_in, raw)?;

    let result = Command::new("ffmpeg")
        .arg("-i")
        .arg(&scratch_in)
        .arg("-vn")
        .arg("-codec:a")
        .arg("libmp3lame")
        .arg("-ar")
        .arg("44100")
        .arg("-b:a")
        .arg("160k")
        .arg("-y")
        .arg("-loglevel")
        .arg("error")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    let _ = std::fs::remove_file(&scratch_in);

    match result {
        Ok(out) if out.status.success() => {
            debug!(dest = %dest.display(), "normalized TTS clip to mp3");
            Ok(dest.to_path_buf())
        }
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(CoreError::ToolFailed(format!("ffmpeg normalization failed: {err}")))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CoreError::ToolNotFound("ffmpeg".to_string())),
        Err(e) => Err(CoreError::ToolFailed(format!("ffmpeg error: {e}"))),
    }
}

/// Query a clip's duration in seconds via ffprobe.
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let result = Command::new("ffprobe")
        .arg("-v")
        .arg("quiet")
        .arg("-print_format")
        .arg("json")
        .arg("-show_format")
        .arg(path)
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(CoreError::ToolNotFound("ffprobe".to_string())),
        Err(e) => return Err(CoreError::ToolFailed(format!("ffprobe failed: {e}"))),
    };

    if !output.status.success() {
        return Err(CoreError::ToolFailed("ffprobe returned a non-zero exit code".to_string()));
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&json_str)?;

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| CoreError::ToolFailed("could not determine clip duration".to_string()))
}
