//! Task state machine.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use reframe_media::{
    extract_audio, probe_duration, ConversionRequest, Supervisor, ToolPaths,
};
use reframe_models::{TargetFormat, TaskId, TaskRecord, TaskStatus};
use reframe_store::TaskStore;

use crate::error::{WorkerError, WorkerResult};

/// Result of dispatching a task to [`TaskEngine::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The task ran to the given terminal status
    Completed(TaskStatus),
    /// The task was not in `initialized` state (or is already leased);
    /// nothing was mutated and no subprocess was launched
    NotReady,
}

/// Drives a single task through its lifecycle.
///
/// All status mutations go through [`TaskEngine::set_status`] so the
/// durable document and the shared map never diverge permanently.
pub struct TaskEngine {
    store: Arc<TaskStore>,
    tools: ToolPaths,
    supervisor: Supervisor,
    /// Ids with an in-flight run; closes the double-dispatch race
    /// between the queue drain and the recovery pass.
    leases: Arc<Mutex<HashSet<TaskId>>>,
}

/// RAII lease over one task id.
struct Lease {
    set: Arc<Mutex<HashSet<TaskId>>>,
    id: TaskId,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.set.lock().expect("lease set poisoned").remove(&self.id);
    }
}

impl TaskEngine {
    pub fn new(store: Arc<TaskStore>, tools: ToolPaths) -> Self {
        let supervisor = Supervisor::new(tools.clone());
        Self {
            store,
            tools,
            supervisor,
            leases: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Load a task record, deriving it from disk when the map has no entry.
    ///
    /// Reads the persisted `task_data` document when present. Without one,
    /// the directory contents decide: a leftover audio artifact means a
    /// previous run was `stopped`, a bare input file means `submitted`, and
    /// an empty or absent directory means a brand-new `submitted` task.
    pub async fn reconstruct(&self, id: &TaskId) -> WorkerResult<TaskRecord> {
        if let Some(record) = self.store.get(id).await {
            return Ok(record);
        }

        if let Some(record) = self.store.load(id).await? {
            debug!(task_id = %id, status = %record.status, "reconstructed task from task_data");
            self.store.insert(record.clone()).await;
            return Ok(record);
        }

        let (input_file_name, status) = self.infer_from_directory(id).await?;
        debug!(task_id = %id, status = %status, "reconstructed task from directory markers");

        let mut record = TaskRecord::new(id.clone(), input_file_name, TargetFormat::default());
        record.status = status;
        self.store.persist(&record).await?;
        Ok(record)
    }

    /// Inspect a task directory without a parsable document.
    async fn infer_from_directory(&self, id: &TaskId) -> WorkerResult<(String, TaskStatus)> {
        let dir = self.store.task_dir(id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(e) => e,
            // absent directory: a brand-new task
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok((String::new(), TaskStatus::Submitted));
            }
            Err(e) => return Err(e.into()),
        };

        let mut has_audio_artifact = false;
        let mut input_candidates: Vec<String> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".mp3") {
                has_audio_artifact = true;
            } else if name.ends_with(".mp4") {
                input_candidates.push(name);
            }
        }

        // Derived filenames are strictly longer than the upload they come
        // from, so the shortest media file is the original input.
        input_candidates.sort_by_key(|n| (n.len(), n.clone()));
        let input_file_name = input_candidates.into_iter().next().unwrap_or_default();

        let status = if has_audio_artifact {
            TaskStatus::Stopped
        } else {
            TaskStatus::Submitted
        };
        Ok((input_file_name, status))
    }

    /// Initialize a `submitted` task: derive paths, extract the audio
    /// track, probe the duration, and transition to `initialized`.
    pub async fn initialize(&self, id: &TaskId) -> WorkerResult<TaskRecord> {
        let mut record = self.reconstruct(id).await?;
        if record.status != TaskStatus::Submitted {
            return Err(WorkerError::invalid_state(id.clone(), record.status, "initialize"));
        }

        // Paths are computed once; a restarted task keeps its originals.
        if !record.has_derived_paths() {
            record.derive_paths(&self.store.task_dir(id));
        }
        let (input, audio) = match (&record.input_file, &record.audio_file) {
            (Some(input), Some(audio)) => (input.clone(), audio.clone()),
            _ => return Err(WorkerError::invalid_state(id.clone(), record.status, "initialize")),
        };

        let lines = extract_audio(&self.tools, &input, &audio).await?;
        record.extend_progress(lines);

        match probe_duration(&self.tools, &input).await {
            Ok(duration) => record.video_length = Some(duration),
            Err(e) => warn!(task_id = %id, "duration probe failed, using default: {e}"),
        }

        self.set_status(&mut record, TaskStatus::Initialized).await?;
        info!(task_id = %id, "task initialized");
        Ok(record)
    }

    /// Run an `initialized` task to a terminal state.
    ///
    /// Calling this on a task in any other state, or on a task with an
    /// in-flight run, returns [`RunOutcome::NotReady`] without mutating
    /// anything; a re-dispatched id is harmless.
    pub async fn run(&self, id: &TaskId) -> WorkerResult<RunOutcome> {
        let Some(_lease) = self.acquire_lease(id) else {
            debug!(task_id = %id, "task already leased, not ready");
            return Ok(RunOutcome::NotReady);
        };

        let mut record = self.reconstruct(id).await?;
        if record.status != TaskStatus::Initialized {
            return Ok(RunOutcome::NotReady);
        }
        let request = match (
            &record.input_file,
            &record.output_file_no_audio,
            &record.audio_file,
            &record.output_file,
        ) {
            (Some(input), Some(no_audio), Some(audio), Some(output)) => ConversionRequest {
                input_file: input.clone(),
                output_file_no_audio: no_audio.clone(),
                audio_file: audio.clone(),
                output_file: output.clone(),
                aspect_ratio: record.target_format,
                duration_secs: record.video_length,
            },
            _ => return Err(WorkerError::invalid_state(id.clone(), record.status, "run")),
        };

        self.set_status(&mut record, TaskStatus::Running).await?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let supervisor = self.supervisor.clone();
        let handle = tokio::spawn(async move { supervisor.run(&request, tx).await });

        // Progress lines land in the shared map as they arrive so status
        // readers see them before the task completes.
        while let Some(line) = rx.recv().await {
            self.store.append_progress(id, line).await;
        }

        let result = handle
            .await
            .map_err(|e| WorkerError::internal(format!("supervisor task panicked: {e}")))?;

        // Pick up the progress accumulated during the run.
        let mut record = self.store.get(id).await.unwrap_or(record);

        match result {
            Ok(outcome) => {
                let status = if outcome.is_success() {
                    TaskStatus::Success
                } else {
                    TaskStatus::Stopped
                };
                self.set_status(&mut record, status).await?;
                info!(task_id = %id, status = %status, ?outcome, "task finished");
                Ok(RunOutcome::Completed(status))
            }
            Err(e) => {
                // Launch failures and the like: reported, marked stopped,
                // never retried.
                self.set_status(&mut record, TaskStatus::Stopped).await?;
                Err(e.into())
            }
        }
    }

    /// Reset a terminal task to `submitted`, clearing its progress log.
    ///
    /// Rejected while a run holds the lease; the in-flight run is never
    /// aborted.
    pub async fn restart(&self, id: &TaskId) -> WorkerResult<TaskRecord> {
        if self.leases.lock().expect("lease set poisoned").contains(id) {
            return Err(WorkerError::TaskBusy(id.clone()));
        }

        let mut record = self.reconstruct(id).await?;
        if !record.status.is_terminal() {
            return Err(WorkerError::invalid_state(id.clone(), record.status, "restart"));
        }

        record.progress.clear();
        self.set_status(&mut record, TaskStatus::Submitted).await?;
        info!(task_id = %id, "task restarted");
        Ok(record)
    }

    /// Set a task's status, write the record through to disk, and update
    /// the shared map. The only mutation surface other components use.
    pub async fn set_status(
        &self,
        record: &mut TaskRecord,
        status: TaskStatus,
    ) -> WorkerResult<()> {
        if !record.status.can_transition_to(status) {
            return Err(WorkerError::IllegalTransition {
                task_id: record.task_id.clone(),
                from: record.status,
                to: status,
            });
        }
        record.status = status;
        record.updated_at = chrono::Utc::now();
        self.store.persist(record).await?;
        debug!(task_id = %record.task_id, status = %status, "status persisted");
        Ok(())
    }

    fn acquire_lease(&self, id: &TaskId) -> Option<Lease> {
        let mut set = self.leases.lock().expect("lease set poisoned");
        if !set.insert(id.clone()) {
            return None;
        }
        Some(Lease {
            set: Arc::clone(&self.leases),
            id: id.clone(),
        })
    }
}
