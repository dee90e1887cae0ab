//! Audio extraction and the final remux step.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::command::ToolPaths;
use crate::error::{MediaError, MediaResult};

/// Extract the audio track from `input` into `audio_out`.
///
/// Returns the captured output lines for the task's progress log. A
/// non-zero exit is tolerated and only logged; sources without an audio
/// track still get a conversion attempt.
pub async fn extract_audio(
    tools: &ToolPaths,
    input: impl AsRef<Path>,
    audio_out: impl AsRef<Path>,
) -> MediaResult<Vec<String>> {
    let mut args = base_args();
    args.push("-i".into());
    args.push(input.as_ref().display().to_string());
    args.push("-vn".into());
    args.push("-f".into());
    args.push("adts".into());
    args.push(audio_out.as_ref().display().to_string());
    run_ffmpeg(tools, &args, "audio extraction").await
}

/// Combine the silent conversion output with the previously extracted
/// audio track into the final output file (copy-remux, no re-encode).
pub async fn remux(
    tools: &ToolPaths,
    video_no_audio: impl AsRef<Path>,
    audio: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<Vec<String>> {
    let mut args = base_args();
    args.push("-i".into());
    args.push(video_no_audio.as_ref().display().to_string());
    args.push("-i".into());
    args.push(audio.as_ref().display().to_string());
    for arg in ["-c", "copy", "-map", "0:v:0", "-map", "1:a:0"] {
        args.push(arg.into());
    }
    args.push(output.as_ref().display().to_string());
    run_ffmpeg(tools, &args, "remux").await
}

fn base_args() -> Vec<String> {
    ["-nostats", "-loglevel", "0", "-y"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Run ffmpeg to completion, capturing merged output as lines.
async fn run_ffmpeg(tools: &ToolPaths, args: &[String], step: &str) -> MediaResult<Vec<String>> {
    let ffmpeg = ToolPaths::resolve(&tools.ffmpeg_bin)?;
    debug!(step, "running ffmpeg {}", args.join(" "));

    let output = Command::new(&ffmpeg)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| MediaError::launch(ffmpeg.display().to_string(), e))?;

    if !output.status.success() {
        warn!(step, code = ?output.status.code(), "ffmpeg exited with non-zero status");
    }

    let mut lines: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_owned)
        .collect();
    lines.extend(
        String::from_utf8_lossy(&output.stderr)
            .lines()
            .map(str::to_owned),
    );
    Ok(lines)
}
