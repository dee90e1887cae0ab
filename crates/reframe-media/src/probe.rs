//! FFprobe duration probing.

use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;

use crate::command::ToolPaths;
use crate::error::{MediaError, MediaResult};

/// FFprobe JSON output, reduced to the fields we read.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Probe a media file for its duration in seconds.
///
/// Probing is best-effort: the caller falls back to a default duration
/// when this fails, so the only consequences of an error are a default
/// runaway timeout and an unset `video_length`.
pub async fn probe_duration(tools: &ToolPaths, path: impl AsRef<Path>) -> MediaResult<f64> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let ffprobe = ToolPaths::resolve(&tools.ffprobe_bin)?;
    let output = Command::new(ffprobe)
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::probe_failed(
            "ffprobe exited with non-zero status",
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
        ));
    }

    parse_duration(&output.stdout)
}

/// Parse the duration out of ffprobe's JSON output.
fn parse_duration(bytes: &[u8]) -> MediaResult<f64> {
    let probe: FfprobeOutput = serde_json::from_slice(bytes)?;
    probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| MediaError::probe_failed("no duration in ffprobe output", None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_from_format_section() {
        let json = br#"{"format":{"filename":"clip.mp4","duration":"12.480000"}}"#;
        let duration = parse_duration(json).unwrap();
        assert!((duration - 12.48).abs() < 1e-9);
    }

    #[test]
    fn missing_duration_is_a_probe_failure() {
        let json = br#"{"format":{"filename":"clip.mp4"}}"#;
        assert!(matches!(
            parse_duration(json),
            Err(MediaError::ProbeFailed { .. })
        ));
    }

    #[test]
    fn garbage_output_is_a_parse_error() {
        assert!(matches!(
            parse_duration(b"not json"),
            Err(MediaError::JsonParse(_))
        ));
    }
}
