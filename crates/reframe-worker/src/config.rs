//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use reframe_media::ToolPaths;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Working directory holding one subdirectory per task
    pub working_dir: PathBuf,
    /// External tool paths
    pub tools: ToolPaths,
    /// How often the recovery pass scans for untracked task directories
    pub recovery_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("/tmp/reframe"),
            tools: ToolPaths::default(),
            recovery_interval: Duration::from_secs(1),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = ToolPaths::default();
        Self {
            working_dir: std::env::var("REFRAME_WORKING_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/reframe")),
            tools: ToolPaths {
                convert_bin: std::env::var("REFRAME_CONVERT_BIN")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.convert_bin),
                graph_config: std::env::var("REFRAME_GRAPH_CONFIG")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.graph_config),
                ffmpeg_bin: std::env::var("REFRAME_FFMPEG_BIN")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.ffmpeg_bin),
                ffprobe_bin: std::env::var("REFRAME_FFPROBE_BIN")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.ffprobe_bin),
            },
            recovery_interval: Duration::from_secs(
                std::env::var("REFRAME_RECOVERY_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1),
            ),
        }
    }
}
