//! Store error types.

use reframe_models::TaskId;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The persisted `task_data` document exists but cannot be parsed.
    /// Halts reconstruction of that task only; the caller decides
    /// whether to discard or leave the directory in place.
    #[error("corrupt task_data for task {task_id}: {source}")]
    CorruptRecord {
        task_id: TaskId,
        #[source]
        source: serde_json::Error,
    },

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("task directory already exists: {0}")]
    TaskExists(TaskId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
