//! Session registry.
//!
//! Guarantees at most one live [`SessionEventProcessor`] per task id by
//! serializing lookup and construction through a [`KeyedLock`] keyed on
//! the task id. Submissions for unrelated tasks never contend here
//! beyond the O(1) map sections.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use crate::domain::ports::TaskStore;
use crate::services::session::{SessionConfig, SessionEventProcessor};
use crate::sync::KeyedLock;

/// Registry handing out one processor per live session.
pub struct SessionManager {
    store: Arc<dyn TaskStore>,
    config: SessionConfig,
    lock: KeyedLock<String>,
    sessions: StdMutex<HashMap<String, Arc<SessionEventProcessor>>>,
}

impl SessionManager {
    /// Create a manager over the given store.
    pub fn new(store: Arc<dyn TaskStore>, config: SessionConfig) -> Self {
        Self {
            store,
            config,
            lock: KeyedLock::new(),
            sessions: StdMutex::new(HashMap::new()),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Arc<SessionEventProcessor>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the live processor for `task_id`, creating one if none exists.
    ///
    /// A previously closed processor is evicted and replaced by a fresh
    /// open one. Concurrent calls for the same task id serialize, so two
    /// callers racing on a new session observe the same instance.
    pub async fn session(&self, context_id: &str, task_id: &str) -> Arc<SessionEventProcessor> {
        self.lock
            .with_lock(task_id.to_string(), None, async {
                if let Some(existing) = self.sessions().get(task_id).cloned() {
                    if existing.is_open() {
                        return existing;
                    }
                    tracing::debug!(task_id, "evicting closed session");
                }
                let processor = Arc::new(SessionEventProcessor::new(
                    context_id,
                    task_id,
                    self.store.clone(),
                    self.config.clone(),
                ));
                self.sessions()
                    .insert(task_id.to_string(), processor.clone());
                tracing::debug!(context_id, task_id, "session created");
                processor
            })
            .await
    }

    /// Close and drop the processor for `task_id`, if any.
    pub async fn remove(&self, task_id: &str) {
        let removed = self
            .lock
            .with_lock(task_id.to_string(), None, async {
                self.sessions().remove(task_id)
            })
            .await;
        if let Some(processor) = removed {
            processor.close().await;
            tracing::debug!(task_id, "session removed");
        }
    }

    /// Number of registered sessions, live or awaiting eviction.
    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }
}
