//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces that storage adapters must implement:
//! - `TaskStore`: persistence for task snapshots
//!
//! These contracts keep the session layer independent of any specific
//! storage backend.

pub mod task_store;

pub use task_store::{StoreError, TaskStore};
