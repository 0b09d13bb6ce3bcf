//! Per-key asynchronous mutual exclusion.
//!
//! A `KeyedLock` serializes operations that share a key while leaving
//! unrelated keys fully parallel. Entries are created lazily on first
//! use and removed the instant the last holder or waiter for a key is
//! gone, so the registry never accumulates state for uncontended keys.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};

use crate::domain::errors::{LockError, LockResult};

/// Per-key bookkeeping.
///
/// Invariant: an entry is present in the registry iff `refcount > 0`,
/// where the count covers the current holder plus all pending waiters.
struct Entry {
    mutex: Arc<TokioMutex<()>>,
    refcount: usize,
    holder: Option<Holder>,
}

struct Holder {
    // Held for its Drop side effect: releasing it wakes the next waiter.
    _guard: OwnedMutexGuard<()>,
    owner: Option<String>,
}

impl Entry {
    fn new() -> Self {
        Self {
            mutex: Arc::new(TokioMutex::new(())),
            refcount: 0,
            holder: None,
        }
    }
}

/// A registry of independent exclusive locks, one per key.
///
/// Acquisitions on the same key are granted in arrival (FIFO) order.
/// Not re-entrant: a task that already holds a key and awaits `lock` on
/// it again suspends until someone else releases it, which for a single
/// holder means forever. That behavior is intentional and relied on as a
/// misuse detector by callers.
///
/// Construct instances explicitly and share them via `Arc`; there is no
/// global registry.
pub struct KeyedLock<K> {
    entries: StdMutex<HashMap<K, Entry>>,
}

impl<K> Default for KeyedLock<K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> KeyedLock<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: StdMutex::new(HashMap::new()),
        }
    }

    // Registry sections are short and synchronous; a panic inside one
    // leaves the map in a consistent state, so poisoning is recovered.
    fn entries(&self) -> MutexGuard<'_, HashMap<K, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquire the lock for `key`, suspending until it is free.
    ///
    /// If `owner` is supplied it is recorded as the current holder and
    /// must be presented again to [`Self::unlock`]. Cancelling the
    /// returned future while it waits rolls the key's accounting back as
    /// if the waiter never existed.
    pub async fn lock(&self, key: K, owner: Option<&str>) {
        let mutex = {
            let mut entries = self.entries();
            let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
            entry.refcount += 1;
            entry.mutex.clone()
        };

        // Rolls the pending count back if this future is dropped before
        // the acquisition completes.
        let mut pending = PendingWaiter {
            lock: self,
            key: Some(key),
        };

        let guard = mutex.lock_owned().await;

        let Some(key) = pending.key.take() else {
            unreachable!("pending waiter disarmed twice");
        };
        let mut entries = self.entries();
        if let Some(entry) = entries.get_mut(&key) {
            entry.holder = Some(Holder {
                _guard: guard,
                owner: owner.map(String::from),
            });
        }
        tracing::trace!(key = ?key, owner, "keyed lock acquired");
    }

    /// Attempt immediate acquisition; never suspends.
    pub fn try_lock(&self, key: K, owner: Option<&str>) -> bool {
        let mut entries = self.entries();
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
        match entry.mutex.clone().try_lock_owned() {
            Ok(guard) => {
                entry.refcount += 1;
                entry.holder = Some(Holder {
                    _guard: guard,
                    owner: owner.map(String::from),
                });
                tracing::trace!(key = ?key, owner, "keyed lock acquired (try)");
                true
            }
            Err(_) => {
                // A freshly inserted entry with no holders or waiters
                // must not linger.
                if entry.refcount == 0 {
                    entries.remove(&key);
                }
                false
            }
        }
    }

    /// Release a held lock.
    ///
    /// Fails with [`LockError::NotLocked`] if the key has no current
    /// holder, and with [`LockError::OwnerMismatch`] if the recorded
    /// owner differs from `owner`. On success, the key's entry is
    /// removed from the registry when nobody else is waiting.
    pub fn unlock(&self, key: &K, owner: Option<&str>) -> LockResult<()> {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            return Err(LockError::NotLocked(format!("{key:?}")));
        };
        let Some(holder) = entry.holder.as_ref() else {
            return Err(LockError::NotLocked(format!("{key:?}")));
        };
        if holder.owner.as_deref() != owner {
            return Err(LockError::OwnerMismatch(format!("{key:?}")));
        }

        // Dropping the holder's guard wakes the next waiter in FIFO order.
        entry.holder = None;
        entry.refcount -= 1;
        if entry.refcount == 0 {
            entries.remove(key);
        }
        tracing::trace!(key = ?key, owner, "keyed lock released");
        Ok(())
    }

    /// Whether `key` currently has a holder. Observational only.
    pub fn is_locked(&self, key: &K) -> bool {
        self.entries()
            .get(key)
            .is_some_and(|entry| entry.holder.is_some())
    }

    /// Whether `owner` is the current holder of `key`. Returns false for
    /// unknown keys.
    pub fn holds_lock(&self, key: &K, owner: &str) -> bool {
        self.entries().get(key).is_some_and(|entry| {
            entry
                .holder
                .as_ref()
                .is_some_and(|holder| holder.owner.as_deref() == Some(owner))
        })
    }

    /// Number of live entries (holders or waiters). Diagnostics only.
    pub fn entry_count(&self) -> usize {
        self.entries().len()
    }

    /// Run `body` with the lock for `key` held, releasing it on every
    /// exit path: normal completion, panic unwind, and cancellation of
    /// the surrounding task.
    pub async fn with_lock<T, F>(&self, key: K, owner: Option<&str>, body: F) -> T
    where
        F: Future<Output = T>,
    {
        self.lock(key.clone(), owner).await;
        let _release = ReleaseOnDrop {
            lock: self,
            key,
            owner: owner.map(String::from),
        };
        body.await
    }
}

/// Rolls back a pending waiter's refcount unless disarmed.
struct PendingWaiter<'a, K>
where
    K: Eq + Hash + Clone + Debug,
{
    lock: &'a KeyedLock<K>,
    key: Option<K>,
}

impl<K> Drop for PendingWaiter<'_, K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let mut entries = self.lock.entries();
            if let Some(entry) = entries.get_mut(&key) {
                entry.refcount -= 1;
                if entry.refcount == 0 {
                    entries.remove(&key);
                }
            }
            tracing::trace!(key = ?key, "keyed lock wait abandoned");
        }
    }
}

/// Releases a held key when dropped; release is synchronous, so it also
/// runs when the owning future is cancelled.
struct ReleaseOnDrop<'a, K>
where
    K: Eq + Hash + Clone + Debug,
{
    lock: &'a KeyedLock<K>,
    key: K,
    owner: Option<String>,
}

impl<K> Drop for ReleaseOnDrop<'_, K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn drop(&mut self) {
        if let Err(err) = self.lock.unlock(&self.key, self.owner.as_deref()) {
            tracing::warn!(key = ?self.key, %err, "release on drop failed");
        }
    }
}
