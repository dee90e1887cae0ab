//! Shared data models for the reframe backend.
//!
//! This crate provides Serde-serializable types for:
//! - Task records and their derived file paths
//! - The task status state machine vocabulary
//! - Target aspect ratios
//! - Caption asset metadata

pub mod format;
pub mod status;
pub mod task;

pub use format::{FormatParseError, TargetFormat};
pub use status::TaskStatus;
pub use task::{CaptionAsset, TaskId, TaskRecord};
