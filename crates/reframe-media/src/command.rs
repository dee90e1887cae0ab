//! Conversion-tool command builder and tool paths.

use std::path::{Path, PathBuf};

use reframe_models::TargetFormat;

use crate::error::{MediaError, MediaResult};

/// Paths of the external tools the supervisor drives.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    /// The aspect-ratio conversion binary
    pub convert_bin: PathBuf,
    /// Calculator graph config passed to the conversion binary
    pub graph_config: PathBuf,
    /// FFmpeg, for audio extraction and the remux step
    pub ffmpeg_bin: PathBuf,
    /// FFprobe, for duration probing
    pub ffprobe_bin: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            convert_bin: PathBuf::from(
                "/mediapipe/bazel-bin/mediapipe/examples/desktop/autoflip/run_autoflip",
            ),
            graph_config: PathBuf::from(
                "/mediapipe/mediapipe/examples/desktop/autoflip/autoflip_graph.pbtxt",
            ),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
        }
    }
}

impl ToolPaths {
    /// Resolve a tool path, checking PATH for bare names.
    pub fn resolve(bin: &Path) -> MediaResult<PathBuf> {
        which::which(bin).map_err(|_| MediaError::ToolNotFound(bin.display().to_string()))
    }
}

/// Builder for the conversion-tool command line.
///
/// Input, output and aspect ratio travel as explicit side packets on the
/// command line, never via stdin.
#[derive(Debug, Clone)]
pub struct ConvertCommand {
    graph_config: PathBuf,
    input: PathBuf,
    output: PathBuf,
    aspect_ratio: TargetFormat,
}

impl ConvertCommand {
    /// Create a command converting `input` into `output` at `aspect_ratio`.
    pub fn new(
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        aspect_ratio: TargetFormat,
    ) -> Self {
        Self {
            graph_config: ToolPaths::default().graph_config,
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            aspect_ratio,
        }
    }

    /// Override the calculator graph config.
    pub fn graph_config(mut self, path: impl AsRef<Path>) -> Self {
        self.graph_config = path.as_ref().to_path_buf();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        vec![
            format!(
                "--calculator_graph_config_file={}",
                self.graph_config.display()
            ),
            format!(
                "--input_side_packets=input_video_path={},output_video_path={},aspect_ratio={}",
                self.input.display(),
                self.output.display(),
                self.aspect_ratio
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_args_carries_side_packets() {
        let cmd = ConvertCommand::new("/w/t/clip.mp4", "/w/t/clip_9_16_no_audio.mp4", TargetFormat::Portrait)
            .graph_config("/etc/autoflip.pbtxt");
        let args = cmd.build_args();

        assert_eq!(args.len(), 2);
        assert_eq!(args[0], "--calculator_graph_config_file=/etc/autoflip.pbtxt");
        assert_eq!(
            args[1],
            "--input_side_packets=input_video_path=/w/t/clip.mp4,\
             output_video_path=/w/t/clip_9_16_no_audio.mp4,aspect_ratio=9:16"
        );
    }

    #[test]
    fn resolve_rejects_missing_tool() {
        let missing = Path::new("/definitely/not/a/real/binary");
        assert!(matches!(
            ToolPaths::resolve(missing),
            Err(MediaError::ToolNotFound(_))
        ));
    }
}
