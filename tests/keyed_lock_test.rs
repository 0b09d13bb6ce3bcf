//! Integration tests for the keyed mutual-exclusion primitive.
//!
//! Tests verify:
//! 1. Critical sections on the same key are strictly serialized
//! 2. Unrelated keys proceed fully in parallel
//! 3. The registry never leaks entries for uncontended keys
//! 4. Ownership tokens gate release; misuse fails loudly
//! 5. Cancellation of a pending waiter leaves the accounting intact

mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use a2a_session::{KeyedLock, LockError};
use tokio::time::{sleep, timeout, Instant};

#[tokio::test]
async fn test_same_key_critical_sections_serialize() {
    common::setup_test_logging();
    let lock = Arc::new(KeyedLock::new());
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let slow = {
        let lock = lock.clone();
        let order = order.clone();
        tokio::spawn(async move {
            lock.with_lock("k".to_string(), None, async {
                order.lock().unwrap().push("slow-enter");
                sleep(Duration::from_millis(100)).await;
                order.lock().unwrap().push("slow-exit");
            })
            .await;
        })
    };
    // Give the slow section time to take the key first.
    sleep(Duration::from_millis(20)).await;

    let fast = {
        let lock = lock.clone();
        let order = order.clone();
        tokio::spawn(async move {
            lock.with_lock("k".to_string(), None, async {
                order.lock().unwrap().push("fast-enter");
            })
            .await;
        })
    };

    slow.await.unwrap();
    fast.await.unwrap();

    let order = order.lock().unwrap().clone();
    assert_eq!(order, vec!["slow-enter", "slow-exit", "fast-enter"]);
    assert_eq!(lock.entry_count(), 0);
}

#[tokio::test]
async fn test_unrelated_keys_run_in_parallel() {
    let lock = Arc::new(KeyedLock::new());
    lock.lock("a".to_string(), None).await;

    // Key "b" must not wait on the long-held key "a".
    let start = Instant::now();
    let acquired = timeout(Duration::from_millis(100), lock.lock("b".to_string(), None)).await;
    assert!(acquired.is_ok(), "independent key blocked behind held key");
    assert!(start.elapsed() < Duration::from_millis(100));

    lock.unlock(&"a".to_string(), None).unwrap();
    lock.unlock(&"b".to_string(), None).unwrap();
}

#[tokio::test]
async fn test_parallel_durations_reflect_individual_work() {
    let lock = Arc::new(KeyedLock::new());
    let start = Instant::now();
    let mut handles = Vec::new();
    for (key, millis) in [("fast", 20u64), ("medium", 60), ("slow", 120)] {
        let lock = lock.clone();
        handles.push(tokio::spawn(async move {
            lock.with_lock(key.to_string(), None, async {
                sleep(Duration::from_millis(millis)).await;
            })
            .await;
            (key, Instant::now())
        }));
    }

    let mut finished = Vec::new();
    for handle in handles {
        finished.push(handle.await.unwrap());
    }
    finished.sort_by_key(|(_, at)| *at);
    let keys: Vec<_> = finished.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec!["fast", "medium", "slow"]);

    // Global serialization would need 200ms; parallel keys finish with
    // the slowest one.
    assert!(start.elapsed() < Duration::from_millis(200));
    assert_eq!(lock.entry_count(), 0);
}

#[tokio::test]
async fn test_sequential_use_leaves_no_registry_entries() {
    let lock = KeyedLock::new();
    for _ in 0..50 {
        lock.with_lock("k".to_string(), None, async {}).await;
    }
    assert!(!lock.is_locked(&"k".to_string()));
    assert_eq!(lock.entry_count(), 0);
}

#[tokio::test]
async fn test_ownership_is_enforced_across_callers() {
    let lock = KeyedLock::new();
    lock.lock("k".to_string(), Some("owner-a")).await;

    assert!(matches!(
        lock.unlock(&"k".to_string(), Some("owner-b")),
        Err(LockError::OwnerMismatch(_))
    ));
    assert!(lock.is_locked(&"k".to_string()));
    assert!(lock.holds_lock(&"k".to_string(), "owner-a"));

    lock.unlock(&"k".to_string(), Some("owner-a")).unwrap();
    assert!(!lock.holds_lock(&"k".to_string(), "owner-a"));
}

#[tokio::test]
async fn test_double_unlock_always_fails() {
    let lock = KeyedLock::new();
    lock.lock("k".to_string(), None).await;
    lock.unlock(&"k".to_string(), None).unwrap();

    for _ in 0..3 {
        assert!(matches!(
            lock.unlock(&"k".to_string(), None),
            Err(LockError::NotLocked(_))
        ));
    }
}

#[tokio::test]
async fn test_reacquisition_deadlocks_and_cancel_recovers() {
    let lock = Arc::new(KeyedLock::new());
    lock.lock("k".to_string(), None).await;

    // Same logical flow trying again must suspend, not succeed.
    let second = {
        let lock = lock.clone();
        tokio::spawn(async move { lock.lock("k".to_string(), None).await })
    };
    sleep(Duration::from_millis(100)).await;
    assert!(
        !second.is_finished(),
        "re-entrant acquisition must not succeed"
    );

    // Cancelling the stuck attempt leaves the key unlockable.
    second.abort();
    let _ = second.await;
    lock.unlock(&"k".to_string(), None).unwrap();
    assert_eq!(lock.entry_count(), 0);

    lock.lock("k".to_string(), None).await;
    lock.unlock(&"k".to_string(), None).unwrap();
}

#[tokio::test]
async fn test_stress_no_lost_updates_across_three_keys() {
    let lock = Arc::new(KeyedLock::new());
    let counters: Arc<Vec<AtomicU64>> =
        Arc::new((0..3).map(|_| AtomicU64::new(0)).collect());

    let mut handles = Vec::new();
    for i in 0..300usize {
        let lock = lock.clone();
        let counters = counters.clone();
        handles.push(tokio::spawn(async move {
            let slot = i % 3;
            let key = format!("key-{slot}");
            lock.with_lock(key, None, async {
                // Non-atomic read-modify-write; only mutual exclusion
                // keeps this from losing updates.
                let current = counters[slot].load(Ordering::SeqCst);
                tokio::task::yield_now().await;
                counters[slot].store(current + 1, Ordering::SeqCst);
            })
            .await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for counter in counters.iter() {
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }
    for slot in 0..3 {
        assert!(!lock.is_locked(&format!("key-{slot}")));
    }
    assert_eq!(lock.entry_count(), 0);
}

#[tokio::test]
async fn test_try_lock_never_blocks() {
    let lock = Arc::new(KeyedLock::new());
    lock.lock("k".to_string(), None).await;

    let start = Instant::now();
    assert!(!lock.try_lock("k".to_string(), None));
    assert!(start.elapsed() < Duration::from_millis(10));

    lock.unlock(&"k".to_string(), None).unwrap();
}
