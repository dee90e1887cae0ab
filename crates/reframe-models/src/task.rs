//! Task record: the persisted state of one reformatting job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::{TargetFormat, TaskStatus};

/// Unique identifier for a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a new random task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata for one caption track attached to a task.
///
/// The caption subsystem converts Final Cut XML into WebVTT and records
/// the result here; this crate only carries the metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionAsset {
    /// Absolute path of the WebVTT file inside the task directory
    pub file_path: PathBuf,
    /// Human-readable language label
    pub captions_label: String,
    /// URL the UI serves the track from
    pub captions_source: String,
}

/// A reformatting task as stored in memory and in the `task_data` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique task ID
    pub task_id: TaskId,

    /// Display name, defaults to `task_<task_id>`
    pub task_name: String,

    /// Lifecycle status
    #[serde(default)]
    pub status: TaskStatus,

    /// Original upload filename, relative to the task directory
    pub input_file_name: String,

    /// Target aspect ratio
    pub target_format: TargetFormat,

    /// Absolute path of the uploaded input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_file: Option<PathBuf>,

    /// Absolute path of the final remuxed output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,

    /// Absolute path of the extracted audio track
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_file: Option<PathBuf>,

    /// Absolute path of the audio-stripped input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_file_no_audio: Option<PathBuf>,

    /// Absolute path of the silent conversion output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file_no_audio: Option<PathBuf>,

    /// Media duration in seconds, populated by probing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_length: Option<f64>,

    /// Captured subprocess output, append-only
    #[serde(default)]
    pub progress: Vec<String>,

    /// Caption tracks keyed by language code
    #[serde(default)]
    pub captions: HashMap<String, CaptionAsset>,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Create a fresh `Submitted` record for an uploaded file.
    pub fn new(task_id: TaskId, input_file_name: impl Into<String>, target_format: TargetFormat) -> Self {
        let now = Utc::now();
        let task_name = format!("task_{}", task_id);
        Self {
            task_id,
            task_name,
            status: TaskStatus::Submitted,
            input_file_name: input_file_name.into(),
            target_format,
            input_file: None,
            output_file: None,
            audio_file: None,
            input_file_no_audio: None,
            output_file_no_audio: None,
            video_length: None,
            progress: Vec::new(),
            captions: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Compute and set the derived file paths for this record.
    ///
    /// Called exactly once, at initialization; the paths are never
    /// recomputed afterwards. `clip.mp4` with target `9:16` yields
    /// `clip_9_16.mp4`, `clip.mp3`, `clip_no_audio.mp4` and
    /// `clip_9_16_no_audio.mp4` inside `task_dir`.
    pub fn derive_paths(&mut self, task_dir: &Path) {
        let input = Path::new(&self.input_file_name);
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input_file_name.clone());
        let ext = input.extension().map(|e| e.to_string_lossy().into_owned());
        let fmt = self.target_format.as_filename_part();

        let with_ext = |name: String| match &ext {
            Some(e) => format!("{name}.{e}"),
            None => name,
        };

        self.input_file = Some(task_dir.join(&self.input_file_name));
        self.output_file = Some(task_dir.join(with_ext(format!("{stem}_{fmt}"))));
        self.audio_file = Some(task_dir.join(format!("{stem}.mp3")));
        self.input_file_no_audio = Some(task_dir.join(with_ext(format!("{stem}_no_audio"))));
        self.output_file_no_audio = Some(task_dir.join(with_ext(format!("{stem}_{fmt}_no_audio"))));
    }

    /// True once the derived paths have been computed.
    pub fn has_derived_paths(&self) -> bool {
        self.input_file.is_some()
            && self.output_file.is_some()
            && self.audio_file.is_some()
            && self.output_file_no_audio.is_some()
    }

    /// Check if the task reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Append one captured output line.
    pub fn push_progress(&mut self, line: impl Into<String>) {
        self.progress.push(line.into());
        self.updated_at = Utc::now();
    }

    /// Append a batch of captured output lines.
    pub fn extend_progress<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.progress.extend(lines.into_iter().map(Into::into));
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_submitted() {
        let id = TaskId::new();
        let record = TaskRecord::new(id.clone(), "clip.mp4", TargetFormat::Portrait);
        assert_eq!(record.status, TaskStatus::Submitted);
        assert_eq!(record.task_name, format!("task_{id}"));
        assert!(record.progress.is_empty());
        assert!(!record.has_derived_paths());
    }

    #[test]
    fn derive_paths_follows_naming_scheme() {
        let mut record = TaskRecord::new(TaskId::new(), "clip.mp4", TargetFormat::Portrait);
        record.derive_paths(Path::new("/work/abc"));

        assert_eq!(record.input_file.as_deref(), Some(Path::new("/work/abc/clip.mp4")));
        assert_eq!(record.output_file.as_deref(), Some(Path::new("/work/abc/clip_9_16.mp4")));
        assert_eq!(record.audio_file.as_deref(), Some(Path::new("/work/abc/clip.mp3")));
        assert_eq!(
            record.input_file_no_audio.as_deref(),
            Some(Path::new("/work/abc/clip_no_audio.mp4"))
        );
        assert_eq!(
            record.output_file_no_audio.as_deref(),
            Some(Path::new("/work/abc/clip_9_16_no_audio.mp4"))
        );
        assert!(record.has_derived_paths());
    }

    #[test]
    fn derive_paths_without_extension() {
        let mut record = TaskRecord::new(TaskId::new(), "clip", TargetFormat::Square);
        record.derive_paths(Path::new("/work/t"));
        assert_eq!(record.output_file.as_deref(), Some(Path::new("/work/t/clip_1_1")));
        assert_eq!(record.audio_file.as_deref(), Some(Path::new("/work/t/clip.mp3")));
    }

    #[test]
    fn serde_roundtrip_keeps_progress_order() {
        let mut record = TaskRecord::new(TaskId::new(), "clip.mp4", TargetFormat::Landscape);
        record.push_progress("line one");
        record.push_progress("line two");

        let json = serde_json::to_string(&record).unwrap();
        let back: TaskRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.progress, vec!["line one", "line two"]);
        assert_eq!(back.target_format, TargetFormat::Landscape);
    }

    #[test]
    fn deserializes_minimal_document() {
        // Older documents carry none of the optional fields.
        let json = r#"{
            "task_id": "abc",
            "task_name": "task_abc",
            "status": "submitted",
            "input_file_name": "clip.mp4",
            "target_format": "9:16"
        }"#;
        let record: TaskRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.status, TaskStatus::Submitted);
        assert!(record.progress.is_empty());
        assert!(record.captions.is_empty());
        assert!(record.video_length.is_none());
    }
}
