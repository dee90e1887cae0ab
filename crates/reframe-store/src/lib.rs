//! Directory-backed task store.
//!
//! This crate provides:
//! - The shared in-memory task map
//! - Whole-document JSON write-through to `task_data` files
//! - Directory scanning for crash recovery
//! - Task creation and deletion

pub mod error;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{TaskStore, TASK_DATA_FILE};
