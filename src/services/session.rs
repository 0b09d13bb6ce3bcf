//! Session event processor.
//!
//! A `SessionEventProcessor` owns the event stream of one logical
//! conversation scoped to a (context, task) pair. It accepts either a
//! single direct-reply message or an ordered sequence of task lifecycle
//! events, persists task state through the injected [`TaskStore`], and
//! fans every accepted event out to all current subscribers. After a
//! terminal event the processor closes permanently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{broadcast, Mutex as TokioMutex};

use crate::domain::errors::{SessionError, SessionResult};
use crate::domain::models::{Message, SessionEvent, Task, TaskEvent};
use crate::domain::ports::TaskStore;

/// Configuration for a session processor.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capacity of the broadcast channel carrying published events.
    /// Subscribers that fall further behind than this observe a lag
    /// error instead of silently losing ordering.
    pub channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// Conversation protocol state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// No event processed yet; the session has not committed to a mode.
    Undetermined,
    /// Committed to a single direct-reply exchange.
    MessageMode,
    /// Committed to a task lifecycle event sequence.
    TaskMode,
    /// Terminal; no further submissions are accepted.
    Closed,
}

/// State guarded by the processor's exclusive gate.
struct Inner {
    state: SessionState,
    /// Materialized task snapshot, kept in sync with the store.
    task: Option<Task>,
}

/// Single-writer, ordered, terminable event stream for one session.
///
/// All mutating operations serialize on one internal gate, which stays
/// held across the store round-trip so "validate, apply, publish" is
/// atomic with respect to concurrent submitters. Submissions to other
/// processors are unaffected.
pub struct SessionEventProcessor {
    context_id: String,
    task_id: String,
    store: Arc<dyn TaskStore>,
    inner: TokioMutex<Inner>,
    /// Mirrors `state != Closed` for lock-free observation.
    open: AtomicBool,
    /// Taken and dropped on close so subscriber streams terminate.
    sender: StdMutex<Option<broadcast::Sender<SessionEvent>>>,
    config: SessionConfig,
}

impl SessionEventProcessor {
    /// Create an open processor for the given (context, task) pair.
    pub fn new(
        context_id: impl Into<String>,
        task_id: impl Into<String>,
        store: Arc<dyn TaskStore>,
        config: SessionConfig,
    ) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity);
        Self {
            context_id: context_id.into(),
            task_id: task_id.into(),
            store,
            inner: TokioMutex::new(Inner {
                state: SessionState::Undetermined,
                task: None,
            }),
            open: AtomicBool::new(true),
            sender: StdMutex::new(Some(sender)),
            config,
        }
    }

    /// Context id this processor validates every inbound item against.
    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    /// Task id this processor manages.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Whether the session still accepts submissions.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Attach a subscriber to the event stream.
    ///
    /// The receiver observes every event accepted from this point on, in
    /// acceptance order; nothing already published is replayed. When the
    /// session closes the stream ends cleanly. A subscriber that falls
    /// more than the configured channel capacity behind receives a lag
    /// error from the channel instead of missing events silently.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        match self.sender().as_ref() {
            Some(sender) => sender.subscribe(),
            None => {
                // Already closed: hand out a receiver that terminates
                // immediately.
                let (sender, receiver) = broadcast::channel(1);
                drop(sender);
                receiver
            }
        }
    }

    /// Submit the session's single direct-reply message.
    ///
    /// Valid only while the session is undetermined and no task exists in
    /// the store for this id; on acceptance the message is published and
    /// the session closes, so direct-reply sessions are always one-shot.
    pub async fn send_message(&self, message: Message) -> SessionResult<()> {
        if message.context_id != self.context_id {
            return Err(SessionError::context_mismatch(
                &self.context_id,
                &message.context_id,
            ));
        }

        let mut inner = self.inner.lock().await;
        match inner.state {
            // MessageMode only exists transiently before the close that
            // follows the first accepted message, so it reports the same
            // way as Closed.
            SessionState::Closed | SessionState::MessageMode => {
                return Err(SessionError::NotActive)
            }
            SessionState::TaskMode => {
                return Err(SessionError::InvalidEvent(
                    "session is bound to a task event stream".into(),
                ))
            }
            SessionState::Undetermined => {}
        }

        if self.store.get(&self.task_id, false).await?.is_some() {
            return Err(SessionError::InvalidEvent(format!(
                "task {} already exists; drive it with task events",
                self.task_id
            )));
        }

        inner.state = SessionState::MessageMode;
        self.publish(SessionEvent::Message(message));
        tracing::debug!(
            context_id = %self.context_id,
            task_id = %self.task_id,
            "direct-reply message accepted; closing session"
        );
        self.close_locked(&mut inner);
        Ok(())
    }

    /// Submit a task lifecycle event.
    ///
    /// The first accepted event commits the session to task mode. Status
    /// updates and artifact updates merge into the stored task; an event
    /// marked final closes the session after publication.
    pub async fn send_task_event(&self, event: TaskEvent) -> SessionResult<()> {
        if event.context_id() != self.context_id {
            return Err(SessionError::context_mismatch(
                &self.context_id,
                event.context_id(),
            ));
        }
        if event.task_id() != self.task_id {
            return Err(SessionError::InvalidEvent(format!(
                "task id mismatch: expected {}, got {}",
                self.task_id,
                event.task_id()
            )));
        }

        let mut inner = self.inner.lock().await;
        match inner.state {
            SessionState::Closed | SessionState::MessageMode => {
                return Err(SessionError::NotActive)
            }
            SessionState::Undetermined | SessionState::TaskMode => {}
        }

        let is_final = event.is_final();
        match &event {
            TaskEvent::Task(task) => {
                self.store.update(task).await?;
                inner.task = Some(task.clone());
            }
            TaskEvent::Status(update) => {
                let mut task = self.current_task(&inner).await?;
                task.apply_status(update.status.clone());
                self.store.update(&task).await?;
                inner.task = Some(task);
            }
            TaskEvent::Artifact(update) => {
                let mut task = self.current_task(&inner).await?;
                task.apply_artifact(update.artifact.clone(), update.append);
                self.store.update(&task).await?;
                inner.task = Some(task);
            }
        }

        inner.state = SessionState::TaskMode;
        self.publish(SessionEvent::from(event));
        if is_final {
            tracing::debug!(
                context_id = %self.context_id,
                task_id = %self.task_id,
                "final task event accepted; closing session"
            );
            self.close_locked(&mut inner);
        }
        Ok(())
    }

    /// Close the session. Idempotent; attached subscriber streams end
    /// cleanly with no further elements.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state != SessionState::Closed {
            self.close_locked(&mut inner);
        }
    }

    fn sender(&self) -> std::sync::MutexGuard<'_, Option<broadcast::Sender<SessionEvent>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: SessionEvent) {
        if let Some(sender) = self.sender().as_ref() {
            // Ignore send errors - may have no subscribers.
            let _ = sender.send(event);
        }
    }

    fn close_locked(&self, inner: &mut Inner) {
        inner.state = SessionState::Closed;
        self.open.store(false, Ordering::SeqCst);
        // Dropping the sender terminates every attached receiver once it
        // drains the events already published.
        self.sender().take();
    }

    /// Snapshot to merge an update into: the materialized view if the
    /// session already saw an event, otherwise the stored task.
    async fn current_task(&self, inner: &Inner) -> SessionResult<Task> {
        if let Some(task) = &inner.task {
            return Ok(task.clone());
        }
        match self.store.get(&self.task_id, true).await? {
            Some(task) => Ok(task),
            None => Err(SessionError::InvalidEvent(format!(
                "no task {} to apply the update to",
                self.task_id
            ))),
        }
    }

    /// Configured channel capacity.
    pub fn channel_capacity(&self) -> usize {
        self.config.channel_capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryTaskStore;
    use crate::domain::models::{Role, TaskState, TaskStatus, TaskStatusUpdate};

    fn processor() -> SessionEventProcessor {
        SessionEventProcessor::new(
            "ctx-1",
            "task-1",
            Arc::new(InMemoryTaskStore::new()),
            SessionConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_message_session_is_one_shot() {
        let proc = processor();
        assert!(proc.is_open());

        proc.send_message(Message::new("ctx-1", Role::Agent, "hello"))
            .await
            .unwrap();
        assert!(!proc.is_open());

        let err = proc
            .send_message(Message::new("ctx-1", Role::Agent, "again"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotActive));
    }

    #[tokio::test]
    async fn test_context_mismatch_rejected_without_state_change() {
        let proc = processor();
        let err = proc
            .send_message(Message::new("ctx-other", Role::User, "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidEvent(_)));
        assert!(proc.is_open());
    }

    #[tokio::test]
    async fn test_final_status_closes() {
        let proc = processor();
        proc.send_task_event(TaskEvent::Task(Task::new("task-1", "ctx-1")))
            .await
            .unwrap();
        assert!(proc.is_open());

        proc.send_task_event(TaskEvent::Status(
            TaskStatusUpdate::new("task-1", "ctx-1", TaskStatus::new(TaskState::Completed))
                .finalizing(),
        ))
        .await
        .unwrap();
        assert!(!proc.is_open());
    }

    #[tokio::test]
    async fn test_subscribe_after_close_terminates_immediately() {
        let proc = processor();
        proc.close().await;
        let mut rx = proc.subscribe();
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let proc = processor();
        proc.close().await;
        proc.close().await;
        assert!(!proc.is_open());
    }
}
