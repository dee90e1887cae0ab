//! End-to-end task lifecycle tests driven by stub executables.
//!
//! The conversion tool, ffmpeg and ffprobe are replaced by shell scripts
//! so the full submit -> initialize -> run -> terminal path runs without
//! any media tooling installed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reframe_media::ToolPaths;
use reframe_models::{TargetFormat, TaskId, TaskStatus};
use reframe_queue::TaskQueue;
use reframe_store::TaskStore;
use reframe_worker::{Executor, RunOutcome, WorkerConfig, WorkerError};

/// Write an executable stub script and return its path.
fn write_stub(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Stub tool set: ffmpeg logs and touches its last argument, ffprobe
/// reports a fixed duration, the conversion stub body is per-test.
fn stub_tools(bin_dir: &Path, convert_body: &str, duration: &str) -> ToolPaths {
    ToolPaths {
        convert_bin: write_stub(bin_dir, "convert", convert_body),
        graph_config: bin_dir.join("graph.pbtxt"),
        ffmpeg_bin: write_stub(
            bin_dir,
            "ffmpeg",
            "for a in \"$@\"; do last=$a; done\necho \"ffmpeg: writing $last\"\n: > \"$last\"",
        ),
        ffprobe_bin: write_stub(
            bin_dir,
            "ffprobe",
            &format!("echo '{{\"format\":{{\"duration\":\"{duration}\"}}}}'"),
        ),
    }
}

struct Rig {
    _tmp: tempfile::TempDir,
    work_dir: PathBuf,
    tools: ToolPaths,
    store: Arc<TaskStore>,
    executor: Executor,
}

impl Rig {
    async fn new(convert_body: &str) -> Self {
        Self::with_duration(convert_body, "2.0").await
    }

    async fn with_duration(convert_body: &str, duration: &str) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let bin_dir = tmp.path().join("bin");
        let work_dir = tmp.path().join("work");
        std::fs::create_dir_all(&bin_dir).unwrap();
        let tools = stub_tools(&bin_dir, convert_body, duration);
        let (store, executor) = Self::boot(&work_dir, &tools).await;
        Self {
            _tmp: tmp,
            work_dir,
            tools,
            store,
            executor,
        }
    }

    async fn boot(work_dir: &Path, tools: &ToolPaths) -> (Arc<TaskStore>, Executor) {
        let store = Arc::new(TaskStore::open(work_dir).await.unwrap());
        let config = WorkerConfig {
            working_dir: work_dir.to_path_buf(),
            tools: tools.clone(),
            recovery_interval: Duration::from_millis(50),
        };
        let executor = Executor::new(config, Arc::clone(&store), Arc::new(TaskQueue::new()));
        (store, executor)
    }

    /// A fresh store and executor over the same working directory,
    /// simulating a process restart with an empty in-memory map.
    async fn reboot(&self) -> (Arc<TaskStore>, Executor) {
        Self::boot(&self.work_dir, &self.tools).await
    }

    async fn submit(&self) -> TaskId {
        self.store
            .create("clip.mp4", TargetFormat::Portrait, b"fake video bytes")
            .await
            .unwrap()
            .task_id
    }
}

#[tokio::test]
async fn initialize_derives_paths_and_transitions() {
    let rig = Rig::new("echo reformatting").await;
    let id = rig.submit().await;

    let record = rig.executor.engine().initialize(&id).await.unwrap();

    assert_eq!(record.status, TaskStatus::Initialized);
    let output = record.output_file.as_ref().unwrap();
    assert!(output.to_string_lossy().ends_with("clip_9_16.mp4"));
    assert_eq!(record.video_length, Some(2.0));
    // audio extraction output was captured
    assert!(record.progress.iter().any(|l| l.contains("clip.mp3")));
    // write-through: the persisted document matches
    let on_disk = rig.store.load(&id).await.unwrap().unwrap();
    assert_eq!(on_disk.status, TaskStatus::Initialized);
}

#[tokio::test]
async fn initialize_is_only_legal_from_submitted() {
    let rig = Rig::new("echo reformatting").await;
    let id = rig.submit().await;

    rig.executor.engine().initialize(&id).await.unwrap();
    let err = rig.executor.engine().initialize(&id).await.unwrap_err();
    assert!(matches!(err, WorkerError::InvalidState { .. }));
}

#[tokio::test]
async fn successful_conversion_reaches_success() {
    let rig = Rig::new("echo reformatting frame 1\necho reformatting frame 2").await;
    let id = rig.submit().await;

    rig.executor.process(&id).await;

    let record = rig.store.get(&id).await.unwrap();
    assert_eq!(record.status, TaskStatus::Success);
    assert!(record.output_file.as_ref().unwrap().exists());
    assert!(record.progress.iter().any(|l| l.contains("frame 1")));
    // remux output is recorded after the conversion lines
    assert!(record.progress.iter().any(|l| l.contains("clip_9_16.mp4")));
}

#[tokio::test]
async fn failed_conversion_reaches_stopped_with_full_progress() {
    let rig = Rig::new("echo cannot parse input\nexit 1").await;
    let id = rig.submit().await;

    rig.executor.process(&id).await;

    let record = rig.store.get(&id).await.unwrap();
    assert_eq!(record.status, TaskStatus::Stopped);
    // both the extraction and the remux attempt are visible
    assert!(record.progress.iter().any(|l| l.contains("clip.mp3")));
    assert!(record.progress.iter().any(|l| l.contains("clip_9_16.mp4")));
    assert!(record.progress.iter().any(|l| l.contains("cannot parse input")));
}

#[tokio::test]
async fn run_is_a_noop_unless_initialized() {
    let rig = Rig::new("echo reformatting").await;
    let id = rig.submit().await;

    // still submitted: not ready, nothing mutated, no subprocess launched
    let outcome = rig.executor.engine().run(&id).await.unwrap();
    assert_eq!(outcome, RunOutcome::NotReady);

    let record = rig.store.get(&id).await.unwrap();
    assert_eq!(record.status, TaskStatus::Submitted);
    assert!(record.progress.is_empty());

    // terminal state: same answer
    rig.executor.process(&id).await;
    let outcome = rig.executor.engine().run(&id).await.unwrap();
    assert_eq!(outcome, RunOutcome::NotReady);
}

#[tokio::test]
async fn missing_conversion_binary_marks_task_stopped() {
    let rig = Rig::new("echo unused").await;
    let id = rig.submit().await;
    rig.executor.engine().initialize(&id).await.unwrap();

    // break the tool after initialization
    std::fs::remove_file(&rig.tools.convert_bin).unwrap();

    let err = rig.executor.engine().run(&id).await.unwrap_err();
    assert!(matches!(err, WorkerError::Media(_)));
    assert_eq!(rig.store.get(&id).await.unwrap().status, TaskStatus::Stopped);
}

#[tokio::test]
async fn runaway_conversion_is_killed_and_stopped() {
    // probed duration 0.1s -> 0.4s wall-clock budget
    let rig = Rig::with_duration("echo starting\nexec sleep 30", "0.1").await;
    let id = rig.submit().await;

    let started = std::time::Instant::now();
    rig.executor.process(&id).await;
    assert!(started.elapsed() < Duration::from_secs(10));

    let record = rig.store.get(&id).await.unwrap();
    assert_eq!(record.status, TaskStatus::Stopped);
    // the remux attempt is still recorded on the timeout path
    assert!(record.progress.iter().any(|l| l.contains("clip_9_16.mp4")));
}

#[tokio::test]
async fn restart_resets_to_submitted_and_clears_progress() {
    let rig = Rig::new("echo reformatting").await;
    let id = rig.submit().await;
    rig.executor.process(&id).await;
    assert_eq!(rig.store.get(&id).await.unwrap().status, TaskStatus::Success);

    let record = rig.executor.engine().restart(&id).await.unwrap();
    assert_eq!(record.status, TaskStatus::Submitted);
    assert!(record.progress.is_empty());

    // a restarted task runs again to a terminal state
    rig.executor.process(&id).await;
    assert_eq!(rig.store.get(&id).await.unwrap().status, TaskStatus::Success);
}

#[tokio::test]
async fn restart_is_rejected_for_non_terminal_tasks() {
    let rig = Rig::new("echo reformatting").await;
    let id = rig.submit().await;

    let err = rig.executor.engine().restart(&id).await.unwrap_err();
    assert!(matches!(err, WorkerError::InvalidState { .. }));
}

#[tokio::test]
async fn recovery_runs_persisted_initialized_task_exactly_once() {
    // count conversion invocations through a file next to the stub
    let rig = Rig::new("echo run >> \"$(dirname \"$0\")/count\"\necho reformatting").await;
    let id = rig.submit().await;
    rig.executor.engine().initialize(&id).await.unwrap();

    // simulate a crash: new process, empty map, same directory
    let (store2, executor2) = rig.reboot().await;
    assert!(store2.get(&id).await.is_none());

    executor2.recovery_pass().await;

    let record = store2.get(&id).await.unwrap();
    assert_eq!(record.status, TaskStatus::Success);

    // a second pass sees the task tracked and terminal; no re-run
    executor2.recovery_pass().await;
    let count = std::fs::read_to_string(rig.tools.convert_bin.parent().unwrap().join("count"))
        .unwrap();
    assert_eq!(count.lines().count(), 1);
}

#[tokio::test]
async fn recovery_skips_corrupt_records_and_continues() {
    let rig = Rig::new("echo reformatting").await;

    // a corrupt directory next to a healthy initialized task
    let broken = TaskId::from_string("broken");
    let broken_dir = rig.store.task_dir(&broken);
    std::fs::create_dir_all(&broken_dir).unwrap();
    std::fs::write(broken_dir.join("task_data"), b"{definitely not json").unwrap();

    let id = rig.submit().await;
    rig.executor.engine().initialize(&id).await.unwrap();

    let (store2, executor2) = rig.reboot().await;
    executor2.recovery_pass().await;

    // the healthy task ran to completion, the corrupt one was skipped
    assert_eq!(store2.get(&id).await.unwrap().status, TaskStatus::Success);
    assert!(store2.get(&broken).await.is_none());
}

#[tokio::test]
async fn reconstruct_infers_status_from_directory_markers() {
    let rig = Rig::new("echo reformatting").await;

    // leftover audio artifact implies a previously stopped job
    let stopped = TaskId::from_string("stopped-task");
    let dir = rig.store.task_dir(&stopped);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("clip.mp4"), b"x").unwrap();
    std::fs::write(dir.join("clip.mp3"), b"x").unwrap();
    let record = rig.executor.engine().reconstruct(&stopped).await.unwrap();
    assert_eq!(record.status, TaskStatus::Stopped);
    assert_eq!(record.input_file_name, "clip.mp4");

    // bare input with no marker implies submitted
    let submitted = TaskId::from_string("submitted-task");
    let dir = rig.store.task_dir(&submitted);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("clip.mp4"), b"x").unwrap();
    let record = rig.executor.engine().reconstruct(&submitted).await.unwrap();
    assert_eq!(record.status, TaskStatus::Submitted);

    // absent directory implies a brand-new submitted task
    let fresh = TaskId::from_string("fresh-task");
    let record = rig.executor.engine().reconstruct(&fresh).await.unwrap();
    assert_eq!(record.status, TaskStatus::Submitted);
}

#[tokio::test]
async fn queue_drain_processes_tasks_in_fifo_order() {
    let rig = Rig::new("echo reformatting").await;
    let first = rig.submit().await;
    let second = rig.submit().await;

    let queue = TaskQueue::new();
    queue.push(first.clone()).await;
    queue.push(second.clone()).await;

    while let Some(id) = queue.try_pop().await {
        rig.executor.process(&id).await;
    }

    assert_eq!(rig.store.get(&first).await.unwrap().status, TaskStatus::Success);
    assert_eq!(rig.store.get(&second).await.unwrap().status, TaskStatus::Success);
}
