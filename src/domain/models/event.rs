//! Session event domain models.
//!
//! `TaskEvent` is the inbound union submitted by the transport layer;
//! `SessionEvent` is the published union seen by subscribers. Every
//! inbound item carries the context id of the session it targets.

use serde::{Deserialize, Serialize};

use super::message::Message;
use super::task::{Artifact, Task, TaskStatus};

/// A status change for an existing task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusUpdate {
    /// Task being updated.
    pub task_id: String,
    /// Conversation context the task belongs to.
    pub context_id: String,
    /// New status.
    pub status: TaskStatus,
    /// Whether this is the last event of the stream. A final update
    /// closes the owning session after publication.
    pub is_final: bool,
}

impl TaskStatusUpdate {
    /// Create a non-final status update.
    pub fn new(
        task_id: impl Into<String>,
        context_id: impl Into<String>,
        status: TaskStatus,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            context_id: context_id.into(),
            status,
            is_final: false,
        }
    }

    /// Mark the update as final.
    pub fn finalizing(mut self) -> Self {
        self.is_final = true;
        self
    }
}

/// An artifact produced or extended by a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskArtifactUpdate {
    /// Task being updated.
    pub task_id: String,
    /// Conversation context the task belongs to.
    pub context_id: String,
    /// Artifact payload.
    pub artifact: Artifact,
    /// When set, the payload is appended to an existing artifact with
    /// the same id instead of replacing it.
    pub append: bool,
}

impl TaskArtifactUpdate {
    /// Create a replacing artifact update.
    pub fn new(
        task_id: impl Into<String>,
        context_id: impl Into<String>,
        artifact: Artifact,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            context_id: context_id.into(),
            artifact,
            append: false,
        }
    }

    /// Mark the update as appending.
    pub fn appending(mut self) -> Self {
        self.append = true;
        self
    }
}

/// Inbound task lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Full task snapshot; creates or replaces the stored task.
    Task(Task),
    /// Status change for an existing task.
    Status(TaskStatusUpdate),
    /// Artifact produced or extended by an existing task.
    Artifact(TaskArtifactUpdate),
}

impl TaskEvent {
    /// Context id carried by the event.
    pub fn context_id(&self) -> &str {
        match self {
            Self::Task(task) => &task.context_id,
            Self::Status(update) => &update.context_id,
            Self::Artifact(update) => &update.context_id,
        }
    }

    /// Task id carried by the event.
    pub fn task_id(&self) -> &str {
        match self {
            Self::Task(task) => &task.id,
            Self::Status(update) => &update.task_id,
            Self::Artifact(update) => &update.task_id,
        }
    }

    /// Whether accepting this event terminates the stream.
    pub fn is_final(&self) -> bool {
        match self {
            Self::Task(task) => task.is_terminal(),
            Self::Status(update) => update.is_final,
            Self::Artifact(_) => false,
        }
    }
}

/// Event published to session subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Direct-reply message.
    Message(Message),
    /// Full task snapshot.
    Task(Task),
    /// Status change.
    StatusUpdate(TaskStatusUpdate),
    /// Artifact change.
    ArtifactUpdate(TaskArtifactUpdate),
}

impl From<TaskEvent> for SessionEvent {
    fn from(event: TaskEvent) -> Self {
        match event {
            TaskEvent::Task(task) => Self::Task(task),
            TaskEvent::Status(update) => Self::StatusUpdate(update),
            TaskEvent::Artifact(update) => Self::ArtifactUpdate(update),
        }
    }
}

impl From<Message> for SessionEvent {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}
