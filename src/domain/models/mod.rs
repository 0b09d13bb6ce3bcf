//! Domain models for sessions, tasks, and the events that flow between them.

pub mod event;
pub mod message;
pub mod task;

pub use event::{SessionEvent, TaskArtifactUpdate, TaskEvent, TaskStatusUpdate};
pub use message::{Message, Role};
pub use task::{Artifact, Task, TaskState, TaskStatus};
