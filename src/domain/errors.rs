//! Domain errors for session and lock operations.

use thiserror::Error;

use super::ports::task_store::StoreError;

/// Misuse of a [`crate::sync::KeyedLock`].
///
/// These indicate programming defects in the caller, never legitimate
/// runtime conditions; they are surfaced synchronously and never retried.
#[derive(Debug, Error)]
pub enum LockError {
    /// Unlock was attempted on a key that has no current holder.
    #[error("key is not locked: {0}")]
    NotLocked(String),

    /// Unlock was attempted with an owner token that does not match the
    /// recorded holder.
    #[error("lock owner mismatch for key: {0}")]
    OwnerMismatch(String),
}

/// Result alias for lock operations.
pub type LockResult<T> = Result<T, LockError>;

/// Errors surfaced by a [`crate::services::SessionEventProcessor`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// The submitted message or event is inconsistent with the session:
    /// context id mismatch, mode incompatibility, or an update with no
    /// task to apply it to. The session stays open; the caller may retry
    /// with a corrected event.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// The session already closed; permanent for this processor instance.
    #[error("session is no longer active")]
    NotActive,

    /// The task store failed; nothing was applied or published.
    #[error("task store error: {0}")]
    Store(#[from] StoreError),
}

/// Result alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

impl SessionError {
    /// Context-mismatch constructor used on every inbound item.
    pub fn context_mismatch(expected: &str, actual: &str) -> Self {
        Self::InvalidEvent(format!(
            "context id mismatch: expected {expected}, got {actual}"
        ))
    }
}
