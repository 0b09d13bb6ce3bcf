//! Domain layer for the session core
//!
//! This module contains the domain models, errors, and port contracts.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{LockError, LockResult, SessionError, SessionResult};
