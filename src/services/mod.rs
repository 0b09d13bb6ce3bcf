//! Session services: the per-session event processor and its registry.

pub mod manager;
pub mod session;

pub use manager::SessionManager;
pub use session::{SessionConfig, SessionEventProcessor};
