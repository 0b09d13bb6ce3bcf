//! Task domain model.
//!
//! A task is the unit of long-running work tracked by a session. Its
//! lifecycle is a small state machine; terminal states permanently close
//! the owning session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Message;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Task received, not yet picked up by an agent.
    Submitted,
    /// Agent is actively working on the task.
    Working,
    /// Agent is waiting on additional input from the client.
    InputRequired,
    /// Task finished successfully.
    Completed,
    /// Task was canceled by the client.
    Canceled,
    /// Task failed during execution.
    Failed,
    /// Task was rejected before any work started.
    Rejected,
}

impl Default for TaskState {
    fn default() -> Self {
        Self::Submitted
    }
}

impl TaskState {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Working => "working",
            Self::InputRequired => "input_required",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
        }
    }

    /// Parse from the wire string form.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "submitted" => Some(Self::Submitted),
            "working" => Some(Self::Working),
            "input_required" | "input-required" => Some(Self::InputRequired),
            "completed" | "complete" => Some(Self::Completed),
            "canceled" | "cancelled" => Some(Self::Canceled),
            "failed" => Some(Self::Failed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Canceled | Self::Failed | Self::Rejected
        )
    }

    /// Check if this is an active (non-terminal) state.
    pub fn is_active(&self) -> bool {
        !self.is_final()
    }
}

/// Current status of a task: state plus the agent message that
/// accompanied the transition, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Lifecycle state.
    pub state: TaskState,
    /// Message attached to the status change.
    pub message: Option<Message>,
    /// When the status was recorded.
    pub timestamp: DateTime<Utc>,
}

impl TaskStatus {
    /// Create a status for the given state with no attached message.
    pub fn new(state: TaskState) -> Self {
        Self {
            state,
            message: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach a message to the status.
    pub fn with_message(mut self, message: Message) -> Self {
        self.message = Some(message);
        self
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::new(TaskState::default())
    }
}

/// An output produced by a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Artifact id, unique within the task.
    pub id: String,
    /// Optional human-readable name.
    pub name: Option<String>,
    /// Artifact content.
    pub text: String,
}

impl Artifact {
    /// Create a new artifact.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            text: text.into(),
        }
    }

    /// Set the artifact name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A unit of long-running work scoped to a conversation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task id, supplied by the caller.
    pub id: String,
    /// Id of the enclosing conversation context.
    pub context_id: String,
    /// Current status.
    pub status: TaskStatus,
    /// Prior messages, oldest first.
    pub history: Vec<Message>,
    /// Artifacts produced so far.
    pub artifacts: Vec<Artifact>,
    /// When created.
    pub created_at: DateTime<Utc>,
    /// When last updated.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task in the `Submitted` state.
    pub fn new(id: impl Into<String>, context_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            context_id: context_id.into(),
            status: TaskStatus::default(),
            history: Vec::new(),
            artifacts: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the status.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Append a message to the history.
    pub fn with_history_message(mut self, message: Message) -> Self {
        self.history.push(message);
        self
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.state.is_final()
    }

    /// Apply a status update.
    ///
    /// The message attached to the previous status, if any, moves into the
    /// history so the conversational record stays complete.
    pub fn apply_status(&mut self, status: TaskStatus) {
        if let Some(prev) = self.status.message.take() {
            self.history.push(prev);
        }
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Apply an artifact update.
    ///
    /// When `append` is set and an artifact with the same id exists, the
    /// incoming content is concatenated onto it. Otherwise the artifact
    /// replaces any existing one with the same id, or is added.
    pub fn apply_artifact(&mut self, artifact: Artifact, append: bool) {
        match self.artifacts.iter_mut().find(|a| a.id == artifact.id) {
            Some(existing) if append => {
                existing.text.push_str(&artifact.text);
                if existing.name.is_none() {
                    existing.name = artifact.name;
                }
            }
            Some(existing) => *existing = artifact,
            None => self.artifacts.push(artifact),
        }
        self.updated_at = Utc::now();
    }

    /// Copy of this task without history or artifacts.
    pub fn without_detail(&self) -> Self {
        Self {
            history: Vec::new(),
            artifacts: Vec::new(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::message::Role;

    #[test]
    fn test_task_creation() {
        let task = Task::new("task-1", "ctx-1");
        assert_eq!(task.status.state, TaskState::Submitted);
        assert!(!task.is_terminal());
        assert!(task.history.is_empty());
    }

    #[test]
    fn test_final_states() {
        assert!(TaskState::Completed.is_final());
        assert!(TaskState::Canceled.is_final());
        assert!(TaskState::Failed.is_final());
        assert!(TaskState::Rejected.is_final());
        assert!(!TaskState::Working.is_final());
        assert!(!TaskState::InputRequired.is_final());
        assert!(TaskState::Submitted.is_active());
    }

    #[test]
    fn test_state_round_trip() {
        for state in [
            TaskState::Submitted,
            TaskState::Working,
            TaskState::InputRequired,
            TaskState::Completed,
            TaskState::Canceled,
            TaskState::Failed,
            TaskState::Rejected,
        ] {
            assert_eq!(TaskState::from_str(state.as_str()), Some(state));
        }
        assert_eq!(TaskState::from_str("cancelled"), Some(TaskState::Canceled));
        assert_eq!(TaskState::from_str("bogus"), None);
    }

    #[test]
    fn test_apply_status_moves_message_to_history() {
        let mut task = Task::new("task-1", "ctx-1");
        let working_msg = Message::new("ctx-1", Role::Agent, "working on it");
        task.apply_status(TaskStatus::new(TaskState::Working).with_message(working_msg.clone()));
        assert!(task.history.is_empty());

        task.apply_status(TaskStatus::new(TaskState::Completed));
        assert_eq!(task.history, vec![working_msg]);
        assert!(task.is_terminal());
    }

    #[test]
    fn test_apply_artifact_append_and_replace() {
        let mut task = Task::new("task-1", "ctx-1");
        task.apply_artifact(Artifact::new("a1", "hello"), false);
        task.apply_artifact(Artifact::new("a1", " world"), true);
        assert_eq!(task.artifacts.len(), 1);
        assert_eq!(task.artifacts[0].text, "hello world");

        task.apply_artifact(Artifact::new("a1", "reset"), false);
        assert_eq!(task.artifacts[0].text, "reset");

        task.apply_artifact(Artifact::new("a2", "other"), true);
        assert_eq!(task.artifacts.len(), 2);
    }

    #[test]
    fn test_without_detail() {
        let mut task = Task::new("task-1", "ctx-1");
        task.history.push(Message::new("ctx-1", Role::User, "hi"));
        task.apply_artifact(Artifact::new("a1", "x"), false);

        let bare = task.without_detail();
        assert!(bare.history.is_empty());
        assert!(bare.artifacts.is_empty());
        assert_eq!(bare.id, task.id);
        assert_eq!(bare.status, task.status);
    }
}
