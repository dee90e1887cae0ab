//! Supervisor for one conversion run.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use reframe_models::TargetFormat;

use crate::audio::remux;
use crate::command::{ConvertCommand, ToolPaths};
use crate::error::{MediaError, MediaResult};

/// Runaway-process timeout is this multiple of the media duration.
pub const TIMEOUT_FACTOR: f64 = 4.0;

/// Duration assumed when probing failed.
pub const DEFAULT_DURATION_SECS: f64 = 100.0;

/// Everything the supervisor needs to run one conversion.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub input_file: PathBuf,
    pub output_file_no_audio: PathBuf,
    pub audio_file: PathBuf,
    pub output_file: PathBuf,
    pub aspect_ratio: TargetFormat,
    /// Probed media duration; `None` falls back to [`DEFAULT_DURATION_SECS`]
    pub duration_secs: Option<f64>,
}

/// How a supervised conversion ended.
///
/// A non-zero exit and a timeout kill are outcomes, not errors; only a
/// failure to launch the binary surfaces as [`MediaError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// Conversion exited with code 0
    Success,
    /// Conversion exited with a non-zero code
    Failed { exit_code: Option<i32> },
    /// Wall clock exceeded the timeout and the process was killed
    TimedOut,
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ConversionOutcome::Success)
    }
}

/// Runs the conversion binary for one task and manages its full
/// execution envelope: merged output draining, the timeout kill, and
/// the audio re-merge after termination.
#[derive(Debug, Clone, Default)]
pub struct Supervisor {
    tools: ToolPaths,
}

impl Supervisor {
    pub fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }

    /// Run a conversion to completion.
    ///
    /// Output lines from the conversion process and from the remux step
    /// are sent down `lines` as they appear, so readers observe progress
    /// while the process is still running. The sender is dropped when the
    /// run is over.
    pub async fn run(
        &self,
        req: &ConversionRequest,
        lines: mpsc::UnboundedSender<String>,
    ) -> MediaResult<ConversionOutcome> {
        let convert_bin = ToolPaths::resolve(&self.tools.convert_bin)?;
        let args = ConvertCommand::new(
            &req.input_file,
            &req.output_file_no_audio,
            req.aspect_ratio,
        )
        .graph_config(&self.tools.graph_config)
        .build_args();

        debug!("starting conversion: {} {}", convert_bin.display(), args.join(" "));

        let mut child = Command::new(&convert_bin)
            .args(&args)
            .env("GLOG_logtostderr", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MediaError::launch(convert_bin.display().to_string(), e))?;

        // Drain stdout and stderr concurrently with the wait below. Each
        // drain task ends when its stream reaches EOF, never by polling.
        let stdout = child.stdout.take().expect("stdout not captured");
        let stderr = child.stderr.take().expect("stderr not captured");
        let out_drain = tokio::spawn(drain_lines(stdout, lines.clone()));
        let err_drain = tokio::spawn(drain_lines(stderr, lines.clone()));

        let timeout = Duration::from_secs_f64(
            TIMEOUT_FACTOR * req.duration_secs.unwrap_or(DEFAULT_DURATION_SECS),
        );

        let outcome = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => {
                let status = status?;
                if status.success() {
                    ConversionOutcome::Success
                } else {
                    ConversionOutcome::Failed {
                        exit_code: status.code(),
                    }
                }
            }
            Err(_) => {
                warn!(
                    "conversion exceeded {:.0}s wall clock, killing process",
                    timeout.as_secs_f64()
                );
                child.kill().await.ok();
                ConversionOutcome::TimedOut
            }
        };

        // The pipes close once the process is gone, which ends the drains.
        let _ = out_drain.await;
        let _ = err_drain.await;

        // Re-merge audio regardless of how the conversion ended so the
        // failure path is visible in the progress log too.
        let remux_lines = remux(
            &self.tools,
            &req.output_file_no_audio,
            &req.audio_file,
            &req.output_file,
        )
        .await?;
        for line in remux_lines {
            let _ = lines.send(line);
        }

        Ok(outcome)
    }
}

/// Forward one output stream to the line channel until EOF.
async fn drain_lines<R>(stream: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream).lines();
    while let Ok(Some(line)) = reader.next_line().await {
        if tx.send(line).is_err() {
            break;
        }
    }
}
