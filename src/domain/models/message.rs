//! Direct-reply message domain model.
//!
//! Messages carry a single conversational turn between a client and an
//! agent. Identifiers are opaque strings supplied by the transport layer;
//! only the message id itself is generated when not provided.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The end user / calling client.
    User,
    /// The agent serving the session.
    Agent,
}

impl Role {
    /// Stable string form used in wire payloads and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
        }
    }
}

/// A single conversational message scoped to a context and, optionally,
/// a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message id.
    pub id: String,
    /// Id of the enclosing conversation context.
    pub context_id: String,
    /// Task this message belongs to, if any.
    pub task_id: Option<String>,
    /// Sender role.
    pub role: Role,
    /// Message body.
    pub text: String,
    /// When the message was created.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a new message with a generated id.
    pub fn new(context_id: impl Into<String>, role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            context_id: context_id.into(),
            task_id: None,
            role,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    /// Set the message id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Associate the message with a task.
    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::new("ctx-1", Role::User, "hello");
        assert_eq!(msg.context_id, "ctx-1");
        assert_eq!(msg.role, Role::User);
        assert!(msg.task_id.is_none());
        assert!(!msg.id.is_empty());
    }

    #[test]
    fn test_message_builders() {
        let msg = Message::new("ctx-1", Role::Agent, "done")
            .with_id("msg-7")
            .with_task("task-3");
        assert_eq!(msg.id, "msg-7");
        assert_eq!(msg.task_id.as_deref(), Some("task-3"));
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Role::Agent).unwrap();
        assert_eq!(json, "\"agent\"");
    }
}
