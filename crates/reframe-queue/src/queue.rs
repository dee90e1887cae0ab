//! Pending-work queue.

use std::collections::{HashSet, VecDeque};

use tokio::sync::{Mutex, Notify};
use tracing::debug;

use reframe_models::TaskId;

/// FIFO queue of task ids waiting for an executor.
///
/// Popping removes the id from the backlog immediately, so an item is
/// acknowledged whether or not its execution later succeeds and one bad
/// task can never block the queue. A pending set deduplicates pushes:
/// re-enqueueing an id that is already waiting is a no-op until it has
/// been popped.
#[derive(Default)]
pub struct TaskQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
}

#[derive(Default)]
struct QueueInner {
    backlog: VecDeque<TaskId>,
    pending: HashSet<TaskId>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a task id. Returns `false` if the id was already pending.
    pub async fn push(&self, id: TaskId) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.pending.insert(id.clone()) {
            debug!(task_id = %id, "task already pending, push ignored");
            return false;
        }
        inner.backlog.push_back(id);
        drop(inner);
        self.notify.notify_one();
        true
    }

    /// Pop the next id, waiting until one is available.
    pub async fn pop(&self) -> TaskId {
        loop {
            // Register for a wakeup before checking the backlog so a push
            // between the check and the await is not lost.
            let notified = self.notify.notified();
            if let Some(id) = self.try_pop().await {
                return id;
            }
            notified.await;
        }
    }

    /// Pop the next id without waiting.
    pub async fn try_pop(&self) -> Option<TaskId> {
        let mut inner = self.inner.lock().await;
        let id = inner.backlog.pop_front()?;
        inner.pending.remove(&id);
        Some(id)
    }

    /// Number of ids currently waiting.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.backlog.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.backlog.is_empty()
    }
}
