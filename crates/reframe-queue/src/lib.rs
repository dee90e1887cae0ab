//! In-process pending-work queue.
//!
//! This crate provides:
//! - FIFO enqueue of task ids from the request layer
//! - Async blocking pop for the executor (no busy-polling)
//! - Pending-set dedup so a queued id is never queued twice

pub mod queue;

pub use queue::TaskQueue;
