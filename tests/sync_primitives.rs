/*!
 * Synchronization Primitives Integration Tests
 *
 * Fairness, rendezvous atomicity, latch idempotence, and fail-fast
 * destruction across semaphore, barrier, and latch
 */

use concord::{
    BarrierConfig, Collector, LatchConfig, PrimitiveId, SemaphoreConfig, SyncError, SyncRegistry,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_semaphore_fifo_fairness() {
    let registry = SyncRegistry::new();
    let sem = registry.create_semaphore(SemaphoreConfig::new(1));
    sem.acquire(None).unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::new();
    for name in ["A", "B", "C"] {
        let sem = Arc::clone(&sem);
        let order = Arc::clone(&order);
        handles.push(thread::spawn(move || {
            sem.acquire(Some(Duration::from_secs(5))).unwrap();
            order.lock().push(name);
            sem.release().unwrap();
        }));
        // Stagger arrivals so the queue order is A, B, C
        thread::sleep(Duration::from_millis(60));
    }

    sem.release().unwrap();
    for handle in handles {
        handle.join().unwrap();
    }

    // Releases unblock waiters in arrival order
    assert_eq!(*order.lock(), vec!["A", "B", "C"]);
}

#[test]
fn test_semaphore_released_permit_not_stolen() {
    let registry = SyncRegistry::new();
    let sem = registry.create_semaphore(SemaphoreConfig::new(1));
    sem.acquire(None).unwrap();

    let sem_waiter = Arc::clone(&sem);
    let waiter = thread::spawn(move || sem_waiter.acquire(Some(Duration::from_secs(5))));
    thread::sleep(Duration::from_millis(50));

    sem.release().unwrap();
    // The freed permit went straight to the parked waiter
    assert!(!sem.try_acquire());
    assert!(waiter.join().unwrap().is_ok());
}

#[test]
fn test_barrier_atomic_release_with_shared_result() {
    let registry = SyncRegistry::new();
    let action_runs = Arc::new(AtomicUsize::new(0));
    let action_runs_clone = Arc::clone(&action_runs);
    let barrier = registry.create_barrier_with_action(
        BarrierConfig::new(3),
        Some(Arc::new(move || {
            action_runs_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })),
    );

    let mut handles = Vec::new();
    for _ in 0..2 {
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait(Some(Duration::from_secs(5)))
        }));
    }
    thread::sleep(Duration::from_millis(80));

    // The third arrival completes the rendezvous for everyone
    let leader = barrier.wait(Some(Duration::from_secs(5))).unwrap();
    assert!(leader.is_leader);

    let mut generations = vec![leader.generation];
    for handle in handles {
        let result = handle.join().unwrap().unwrap();
        assert!(!result.is_leader);
        generations.push(result.generation);
    }
    // Same generation observed by all three parties
    generations.dedup();
    assert_eq!(generations.len(), 1);

    assert_eq!(action_runs.load(Ordering::SeqCst), 1);
    assert_eq!(barrier.stats().arrived, 0);
}

#[test]
fn test_barrier_timeout_leaves_others_parked() {
    let registry = SyncRegistry::new();
    let barrier = registry.create_barrier(BarrierConfig::new(3));

    // One party with a short deadline, one that outlives it
    let short = {
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || barrier.wait(Some(Duration::from_millis(100))))
    };
    let long = {
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || barrier.wait(Some(Duration::from_secs(5))))
    };
    thread::sleep(Duration::from_millis(200));

    assert!(matches!(
        short.join().unwrap(),
        Err(SyncError::Timeout(_))
    ));
    // The timed-out arrival was undone: still one party short
    assert_eq!(barrier.stats().arrived, 1);

    // Two fresh arrivals complete the rendezvous with the parked waiter
    let filler = {
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || barrier.wait(Some(Duration::from_secs(5))))
    };
    thread::sleep(Duration::from_millis(50));
    assert!(barrier.wait(Some(Duration::from_secs(5))).is_ok());
    assert!(long.join().unwrap().is_ok());
    assert!(filler.join().unwrap().is_ok());
}

#[test]
fn test_latch_idempotent_and_restartable_query() {
    let registry = SyncRegistry::new();
    let latch = registry.create_latch(LatchConfig::new(3));

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let latch = Arc::clone(&latch);
            thread::spawn(move || latch.wait(Some(Duration::from_secs(5))))
        })
        .collect();
    thread::sleep(Duration::from_millis(50));

    assert_eq!(latch.count_down(), 2);
    assert_eq!(latch.count_down(), 1);
    assert_eq!(latch.count_down(), 0);
    // Extra calls never drive the count below zero
    assert_eq!(latch.count_down(), 0);

    for waiter in waiters {
        assert!(waiter.join().unwrap().is_ok());
    }

    // Once open, wait() answers immediately, every time
    for _ in 0..3 {
        let start = Instant::now();
        assert!(latch.wait(Some(Duration::from_secs(1))).is_ok());
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}

#[test]
fn test_destroy_fails_all_pending_waiters() {
    let registry = SyncRegistry::new();
    let sem = registry.create_semaphore(SemaphoreConfig::new(1));
    let latch = registry.create_latch(LatchConfig::new(1));
    sem.acquire(None).unwrap();

    let sem_waiter = {
        let sem = Arc::clone(&sem);
        thread::spawn(move || sem.acquire(Some(Duration::from_secs(5))))
    };
    let latch_waiter = {
        let latch = Arc::clone(&latch);
        thread::spawn(move || latch.wait(Some(Duration::from_secs(5))))
    };
    thread::sleep(Duration::from_millis(50));

    registry.destroy(sem.id()).unwrap();
    registry.destroy(latch.id()).unwrap();

    assert!(matches!(
        sem_waiter.join().unwrap(),
        Err(SyncError::Destroyed(_))
    ));
    assert!(matches!(
        latch_waiter.join().unwrap(),
        Err(SyncError::Destroyed(_))
    ));
    assert_eq!(registry.len(), 0);
}

#[test]
fn test_registry_ids_are_unique() {
    let registry = SyncRegistry::with_collector(Collector::new());
    let a = registry.create_semaphore(SemaphoreConfig::default()).id();
    let b = registry.create_latch(LatchConfig::default()).id();
    let c = registry.create_barrier(BarrierConfig::default()).id();

    let mut ids: Vec<PrimitiveId> = vec![a, b, c];
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}
