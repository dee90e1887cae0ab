//! Reformatting worker.
//!
//! This crate provides:
//! - The task state machine (submit, reconstruct, initialize, run, restart)
//! - The executor loop with crash recovery and queue draining
//! - Worker configuration and graceful shutdown

pub mod config;
pub mod engine;
pub mod error;
pub mod executor;

pub use config::WorkerConfig;
pub use engine::{RunOutcome, TaskEngine};
pub use error::{WorkerError, WorkerResult};
pub use executor::Executor;
