//! Concurrency primitives shared by the session layer.

pub mod keyed_lock;

pub use keyed_lock::KeyedLock;
