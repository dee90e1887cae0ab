//! Executor loop: recovery pass plus queue drain.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use reframe_models::{TaskId, TaskStatus};
use reframe_queue::TaskQueue;
use reframe_store::TaskStore;

use crate::config::WorkerConfig;
use crate::engine::{RunOutcome, TaskEngine};
use crate::error::WorkerResult;

/// Periodic driver that advances queued and recovered tasks to completion.
///
/// Tasks are processed strictly sequentially: one task runs fully,
/// including the blocking wait for process exit, before the next id is
/// popped. The queue drain blocks on an async pop; the recovery pass runs
/// on its own fixed-interval timer.
pub struct Executor {
    config: WorkerConfig,
    store: Arc<TaskStore>,
    queue: Arc<TaskQueue>,
    engine: Arc<TaskEngine>,
    shutdown: watch::Sender<bool>,
}

impl Executor {
    pub fn new(config: WorkerConfig, store: Arc<TaskStore>, queue: Arc<TaskQueue>) -> Self {
        let engine = Arc::new(TaskEngine::new(Arc::clone(&store), config.tools.clone()));
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            store,
            queue,
            engine,
            shutdown,
        }
    }

    /// The state machine driving individual tasks. Exposed so the request
    /// layer can restart tasks and read records through the same surface.
    pub fn engine(&self) -> &Arc<TaskEngine> {
        &self.engine
    }

    /// Run until shutdown is signalled.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            working_dir = %self.store.working_dir().display(),
            "starting executor"
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut recovery = tokio::time::interval(self.config.recovery_interval);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("shutdown signal received, stopping executor");
                        break;
                    }
                }
                _ = recovery.tick() => {
                    self.recovery_pass().await;
                }
                id = self.queue.pop() => {
                    self.process(&id).await;
                }
            }
        }

        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Repair state after a process restart: reconstruct every task
    /// directory the map does not track, and run the ones that were
    /// caught mid-flight in `initialized`.
    pub async fn recovery_pass(&self) {
        let ids = match self.store.scan_directory().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("recovery scan failed: {e}");
                return;
            }
        };

        for id in ids {
            if self.store.contains(&id).await {
                continue;
            }
            let record = match self.engine.reconstruct(&id).await {
                Ok(record) => record,
                Err(e) if e.is_corrupt_record() => {
                    warn!(task_id = %id, "skipping corrupt task directory: {e}");
                    continue;
                }
                Err(e) => {
                    warn!(task_id = %id, "failed to reconstruct task: {e}");
                    continue;
                }
            };
            if record.status == TaskStatus::Initialized {
                info!(task_id = %id, "recovered initialized task, running");
                self.run_task(&id).await;
            }
        }
    }

    /// Advance one dequeued task as far as it will go.
    ///
    /// Every failure is local to the task: the id was already acked by the
    /// pop, corrupt records are skipped, and anything that breaks during
    /// initialization marks the task `stopped`.
    pub async fn process(&self, id: &TaskId) {
        let record = match self.engine.reconstruct(id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(task_id = %id, "skipping unreconstructable task: {e}");
                return;
            }
        };

        if record.status == TaskStatus::Submitted {
            if let Err(e) = self.engine.initialize(id).await {
                error!(task_id = %id, "initialization failed: {e}");
                self.mark_stopped(id).await;
                return;
            }
        }

        self.run_task(id).await;
    }

    async fn run_task(&self, id: &TaskId) {
        match self.engine.run(id).await {
            Ok(RunOutcome::Completed(status)) => {
                info!(task_id = %id, status = %status, "task completed");
            }
            Ok(RunOutcome::NotReady) => {
                debug!(task_id = %id, "task not ready to run");
            }
            // the engine already marked the task stopped
            Err(e) => error!(task_id = %id, "run failed: {e}"),
        }
    }

    /// Best-effort terminal marking for tasks that broke before running.
    async fn mark_stopped(&self, id: &TaskId) {
        if let Some(mut record) = self.store.get(id).await {
            if let Err(e) = self.engine.set_status(&mut record, TaskStatus::Stopped).await {
                error!(task_id = %id, "failed to mark task stopped: {e}");
            }
        }
    }
}
