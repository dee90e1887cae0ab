//! Worker error types.

use reframe_models::{TaskId, TaskStatus};
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// The requested operation is not legal from the task's current state.
    #[error("cannot {op} task {task_id} in state {status}")]
    InvalidState {
        task_id: TaskId,
        status: TaskStatus,
        op: &'static str,
    },

    /// The requested status change is not an edge of the lifecycle graph.
    #[error("illegal transition for task {task_id}: {from} -> {to}")]
    IllegalTransition {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    /// The task is currently leased by an in-flight run.
    #[error("task {0} is busy with an in-flight run")]
    TaskBusy(TaskId),

    #[error("store error: {0}")]
    Store(#[from] reframe_store::StoreError),

    #[error("media error: {0}")]
    Media(#[from] reframe_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    pub fn invalid_state(task_id: TaskId, status: TaskStatus, op: &'static str) -> Self {
        Self::InvalidState { task_id, status, op }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this is a corrupt persisted record, which the executor
    /// skips instead of marking stopped.
    pub fn is_corrupt_record(&self) -> bool {
        matches!(
            self,
            WorkerError::Store(reframe_store::StoreError::CorruptRecord { .. })
        )
    }
}
