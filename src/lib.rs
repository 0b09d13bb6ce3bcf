//! a2a-session - Session core for agent-to-agent task streams
//!
//! This crate provides the concurrency core of an agent-to-agent (A2A)
//! task server: per-key mutual exclusion and single-writer, ordered,
//! terminable event streams per conversation. Transport encoding, LLM
//! clients, and durable storage live behind narrow interfaces and are
//! deliberately out of scope.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors, and port contracts
//! - **Sync Layer** (`sync`): the keyed mutual-exclusion primitive
//! - **Service Layer** (`services`): session processor and registry
//! - **Adapters** (`adapters`): port implementations (in-memory store)
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use a2a_session::adapters::InMemoryTaskStore;
//! use a2a_session::domain::models::{Message, Role};
//! use a2a_session::services::{SessionConfig, SessionManager};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(InMemoryTaskStore::new());
//!     let manager = SessionManager::new(store, SessionConfig::default());
//!     let session = manager.session("ctx-1", "task-1").await;
//!     let mut events = session.subscribe();
//!     session
//!         .send_message(Message::new("ctx-1", Role::Agent, "hello"))
//!         .await
//!         .unwrap();
//!     let published = events.recv().await.unwrap();
//!     println!("{published:?}");
//! }
//! ```

pub mod adapters;
pub mod domain;
pub mod services;
pub mod sync;

// Re-export commonly used types for convenience
pub use adapters::InMemoryTaskStore;
pub use domain::errors::{LockError, LockResult, SessionError, SessionResult};
pub use domain::models::{
    Artifact, Message, Role, SessionEvent, Task, TaskArtifactUpdate, TaskEvent, TaskState,
    TaskStatus, TaskStatusUpdate,
};
pub use domain::ports::{StoreError, TaskStore};
pub use services::{SessionConfig, SessionEventProcessor, SessionManager};
pub use sync::KeyedLock;
