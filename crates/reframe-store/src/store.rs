//! Task store: shared map plus durable task directories.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::RwLock;
use tracing::{debug, warn};

use reframe_models::{TargetFormat, TaskId, TaskRecord};

use crate::error::{StoreError, StoreResult};

/// Name of the persisted JSON document inside each task directory.
pub const TASK_DATA_FILE: &str = "task_data";

/// Single source of truth for task records.
///
/// Holds the shared in-memory map and owns the working directory that
/// contains one subdirectory per task. Durable writes are whole-document
/// JSON overwrites; when the map is empty after a crash, the directory
/// contents are the only truth and [`TaskStore::scan_directory`] feeds
/// the recovery pass.
pub struct TaskStore {
    working_dir: PathBuf,
    tasks: RwLock<HashMap<TaskId, TaskRecord>>,
}

impl TaskStore {
    /// Open a store rooted at `working_dir`, creating it if needed.
    pub async fn open(working_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let working_dir = working_dir.into();
        tokio::fs::create_dir_all(&working_dir).await?;
        Ok(Self {
            working_dir,
            tasks: RwLock::new(HashMap::new()),
        })
    }

    /// Root working directory.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Directory holding all artifacts of one task.
    pub fn task_dir(&self, id: &TaskId) -> PathBuf {
        self.working_dir.join(id.as_str())
    }

    /// Get a snapshot of a record from the in-memory map.
    pub async fn get(&self, id: &TaskId) -> Option<TaskRecord> {
        self.tasks.read().await.get(id).cloned()
    }

    /// Check map presence without cloning.
    pub async fn contains(&self, id: &TaskId) -> bool {
        self.tasks.read().await.contains_key(id)
    }

    /// Put a record into the in-memory map only.
    ///
    /// Durable persistence goes through [`TaskStore::persist`]; progress
    /// updates during a run only need the map so that status readers see
    /// them before the task completes.
    pub async fn insert(&self, record: TaskRecord) {
        self.tasks.write().await.insert(record.task_id.clone(), record);
    }

    /// Append one captured output line to a tracked record, map only.
    pub async fn append_progress(&self, id: &TaskId, line: impl Into<String>) {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(id) {
            Some(record) => record.push_progress(line),
            None => warn!(task_id = %id, "progress line for untracked task dropped"),
        }
    }

    /// Write a record through to disk and update the map.
    ///
    /// The `task_data` document is a whole-document overwrite; there are
    /// no partial updates.
    pub async fn persist(&self, record: &TaskRecord) -> StoreResult<()> {
        let dir = self.task_dir(&record.task_id);
        tokio::fs::create_dir_all(&dir).await?;
        let json = serde_json::to_vec(record)?;
        tokio::fs::write(dir.join(TASK_DATA_FILE), json).await?;
        self.tasks
            .write()
            .await
            .insert(record.task_id.clone(), record.clone());
        Ok(())
    }

    /// Load a record from its `task_data` document, bypassing the map.
    ///
    /// Returns `Ok(None)` when no document exists. An unparsable document
    /// is a [`StoreError::CorruptRecord`] so the caller can skip just this
    /// task.
    pub async fn load(&self, id: &TaskId) -> StoreResult<Option<TaskRecord>> {
        let path = self.task_dir(id).join(TASK_DATA_FILE);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::CorruptRecord {
                task_id: id.clone(),
                source,
            })
    }

    /// Ids currently tracked in memory, in no particular order.
    pub async fn list_ids(&self) -> Vec<TaskId> {
        self.tasks.read().await.keys().cloned().collect()
    }

    /// Enumerate task directories on disk regardless of map presence.
    ///
    /// Used by the recovery pass after a process restart.
    pub async fn scan_directory(&self) -> StoreResult<Vec<TaskId>> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.working_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                ids.push(TaskId::from_string(entry.file_name().to_string_lossy()));
            }
        }
        Ok(ids)
    }

    /// Create a new task: directory, input file, persisted `Submitted` record.
    ///
    /// This is the store-side half of the enqueue contract; the caller
    /// pushes the returned id onto the pending-work queue.
    pub async fn create(
        &self,
        input_file_name: impl Into<String>,
        target_format: TargetFormat,
        input_bytes: &[u8],
    ) -> StoreResult<TaskRecord> {
        let id = TaskId::new();
        let dir = self.task_dir(&id);
        if tokio::fs::try_exists(&dir).await? {
            return Err(StoreError::TaskExists(id));
        }
        tokio::fs::create_dir_all(&dir).await?;

        let record = TaskRecord::new(id.clone(), input_file_name, target_format);
        tokio::fs::write(dir.join(&record.input_file_name), input_bytes).await?;
        self.persist(&record).await?;
        debug!(task_id = %id, "created task directory");
        Ok(record)
    }

    /// Remove a task directory and its map entry.
    ///
    /// Deletion is always an explicit external operation; nothing in the
    /// engine deletes tasks automatically.
    pub async fn delete(&self, id: &TaskId) -> StoreResult<()> {
        let dir = self.task_dir(id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.tasks.write().await.remove(id);
        Ok(())
    }
}
