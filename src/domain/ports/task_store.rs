//! Persistence port for task snapshots.
//!
//! The session layer is the only writer; storage backends are assumed to
//! provide at-least serializable per-key semantics on their own.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::Task;

/// Errors a storage backend can surface through the port.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend failed to execute the operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// A stored snapshot could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Repository port for task persistence.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Get a task by id.
    ///
    /// With `include_history` unset, the returned snapshot carries no
    /// history or artifacts.
    async fn get(&self, id: &str, include_history: bool) -> Result<Option<Task>, StoreError>;

    /// Insert or replace a task snapshot.
    async fn update(&self, task: &Task) -> Result<(), StoreError>;
}
