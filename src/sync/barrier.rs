/*!
 * Cyclic Barrier
 * Fixed-party rendezvous with optional post-arrival action and reset
 *
 * The arrival that completes the party count resolves the whole
 * rendezvous in one critical section: it runs the action, zeroes the
 * counter, bumps the generation, and releases every parked party before
 * the barrier lock is dropped. No caller ever observes a count above the
 * party count, and a timeout that races the final arrival loses cleanly.
 */

use super::waiter::WaitEntry;
use crate::core::errors::SyncError;
use crate::core::limits;
use crate::core::types::{PrimitiveId, SyncResult};
use crate::monitoring::Collector;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Action run by the final arrival before the parties are released.
/// Runs while the barrier is locked; it must not re-enter the barrier.
pub type BarrierAction = Arc<dyn Fn() -> Result<(), String> + Send + Sync>;

/// Barrier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarrierConfig {
    /// Parties expected at each rendezvous (> 0)
    pub parties: u32,
    /// Deadline applied when wait() is called without an explicit timeout
    pub default_timeout: Duration,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            parties: 2,
            default_timeout: limits::DEFAULT_WAIT_TIMEOUT,
        }
    }
}

impl BarrierConfig {
    pub fn new(parties: u32) -> Self {
        Self {
            parties,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

/// Outcome of a successful rendezvous
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    /// True for the arrival that completed the count
    pub is_leader: bool,
    /// Generation that was released
    pub generation: u64,
}

#[derive(Debug)]
struct BarrierState {
    arrived: u32,
    generation: u64,
    queue: VecDeque<WaitEntry<u64>>,
    destroyed: bool,
}

/// Cyclic rendezvous barrier
pub struct Barrier {
    id: PrimitiveId,
    parties: u32,
    default_timeout: Duration,
    action: Option<BarrierAction>,
    state: Mutex<BarrierState>,
    collector: Collector,

    completions: AtomicU64,
    timeouts: AtomicU64,
}

impl Barrier {
    pub fn new(id: PrimitiveId, config: BarrierConfig, collector: Collector) -> Arc<Self> {
        Self::with_action(id, config, None, collector)
    }

    pub fn with_action(
        id: PrimitiveId,
        config: BarrierConfig,
        action: Option<BarrierAction>,
        collector: Collector,
    ) -> Arc<Self> {
        debug_assert!(config.parties > 0);
        let barrier = Arc::new(Self {
            id,
            parties: config.parties.max(1),
            default_timeout: config.default_timeout,
            action,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                queue: VecDeque::new(),
                destroyed: false,
            }),
            collector: collector.clone(),
            completions: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
        });
        collector.primitive_created(id, "barrier");
        barrier
    }

    pub fn id(&self) -> PrimitiveId {
        self.id
    }

    /// Arrive at the barrier and park until all parties arrive.
    pub fn wait(&self, timeout: Option<Duration>) -> SyncResult<BarrierWaitResult> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let entry = {
            let mut state = self.state.lock();
            if state.destroyed {
                return Err(SyncError::Destroyed(format!("barrier {}", self.id)));
            }

            state.arrived += 1;
            if state.arrived == self.parties {
                return self.complete_generation(&mut state);
            }

            let entry = WaitEntry::new();
            state.queue.push_back(WaitEntry {
                slot: Arc::clone(&entry.slot),
                enqueued_at: entry.enqueued_at,
            });
            self.collector
                .metrics()
                .set_gauge_max("barrier.peak_waiters", state.queue.len() as f64);
            entry
        };

        let deadline = entry.enqueued_at + timeout;
        if let Some(resolution) = entry.slot.park_until(deadline) {
            return resolution.map(|generation| BarrierWaitResult {
                is_leader: false,
                generation,
            });
        }

        // Decide-and-commit: undo our own arrival only if we are still
        // queued. Dequeue and decrement happen in one step under the lock,
        // so a final arrival racing this timeout either already released
        // us or observes the corrected count.
        let mut state = self.state.lock();
        if let Some(pos) = state
            .queue
            .iter()
            .position(|e| Arc::ptr_eq(&e.slot, &entry.slot))
        {
            state.queue.remove(pos);
            state.arrived = state.arrived.saturating_sub(1);
            drop(state);
            self.timeouts.fetch_add(1, Ordering::Relaxed);
            self.collector.acquire_timeout(self.id, "barrier", timeout);
            return Err(SyncError::Timeout(format!("barrier {}", self.id)));
        }
        drop(state);

        match entry.slot.resolution() {
            Some(resolution) => resolution.map(|generation| BarrierWaitResult {
                is_leader: false,
                generation,
            }),
            None => Err(SyncError::Timeout(format!("barrier {}", self.id))),
        }
    }

    /// Force-fail all parked parties and zero the counter.
    pub fn reset(&self) {
        let failed = {
            let mut state = self.state.lock();
            state.arrived = 0;
            state.generation += 1;
            state.queue.drain(..).collect::<Vec<_>>()
        };

        for entry in &failed {
            entry
                .slot
                .fail(SyncError::Reset(format!("barrier {}", self.id)));
        }
        if !failed.is_empty() {
            tracing::debug!(barrier = %self.id, failed = failed.len(), "barrier reset");
        }
    }

    /// Tear down the barrier, failing every parked party with Destroyed.
    pub fn destroy(&self) {
        let failed = {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.arrived = 0;
            state.queue.drain(..).collect::<Vec<_>>()
        };

        for entry in &failed {
            entry
                .slot
                .fail(SyncError::Destroyed(format!("barrier {}", self.id)));
        }
        self.collector
            .primitive_destroyed(self.id, "barrier", failed.len());
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    /// Point-in-time statistics
    pub fn stats(&self) -> BarrierStats {
        let state = self.state.lock();
        BarrierStats {
            parties: self.parties,
            arrived: state.arrived,
            waiting: state.queue.len(),
            generation: state.generation,
            completions: self.completions.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            destroyed: state.destroyed,
        }
    }

    /// Leader path: run the action, reset the counter, release everyone.
    /// Called with the state lock held; parked parties resolving timeouts
    /// serialize behind this critical section.
    fn complete_generation(&self, state: &mut BarrierState) -> SyncResult<BarrierWaitResult> {
        state.arrived = 0;
        let generation = state.generation;
        state.generation += 1;
        let waiters: Vec<_> = state.queue.drain(..).collect();

        let action_result = match &self.action {
            Some(action) => action(),
            None => Ok(()),
        };

        match action_result {
            Ok(()) => {
                for entry in &waiters {
                    self.collector
                        .metrics()
                        .record_wait("barrier", entry.enqueued_at.elapsed());
                    entry.slot.grant(generation);
                }
                self.completions.fetch_add(1, Ordering::Relaxed);
                Ok(BarrierWaitResult {
                    is_leader: true,
                    generation,
                })
            }
            Err(msg) => {
                let err = SyncError::ActionFailed(msg);
                for entry in &waiters {
                    entry.slot.fail(err.clone());
                }
                Err(err)
            }
        }
    }
}

/// Snapshot of barrier state for diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarrierStats {
    pub parties: u32,
    pub arrived: u32,
    pub waiting: usize,
    pub generation: u64,
    pub completions: u64,
    pub timeouts: u64,
    pub destroyed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn barrier(parties: u32) -> Arc<Barrier> {
        Barrier::new(
            PrimitiveId(1),
            BarrierConfig::new(parties),
            Collector::new(),
        )
    }

    #[test]
    fn test_rendezvous_releases_all() {
        let barrier = barrier(3);
        let mut handles = Vec::new();
        for _ in 0..2 {
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait(Some(Duration::from_secs(5)))
            }));
        }

        thread::sleep(Duration::from_millis(50));
        let leader = barrier.wait(Some(Duration::from_secs(5))).unwrap();
        assert!(leader.is_leader);
        assert_eq!(leader.generation, 0);

        for handle in handles {
            let result = handle.join().unwrap().unwrap();
            assert!(!result.is_leader);
            assert_eq!(result.generation, 0);
        }

        // Counter reset in the same logical step
        let stats = barrier.stats();
        assert_eq!(stats.arrived, 0);
        assert_eq!(stats.generation, 1);
    }

    #[test]
    fn test_timeout_undoes_arrival() {
        let barrier = barrier(2);
        let result = barrier.wait(Some(Duration::from_millis(50)));
        assert!(matches!(result, Err(SyncError::Timeout(_))));
        assert_eq!(barrier.stats().arrived, 0);

        // The barrier is still usable afterwards
        let barrier_clone = Arc::clone(&barrier);
        let handle = thread::spawn(move || barrier_clone.wait(Some(Duration::from_secs(5))));
        thread::sleep(Duration::from_millis(50));
        assert!(barrier.wait(Some(Duration::from_secs(5))).is_ok());
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_action_result_propagates() {
        let action: BarrierAction = Arc::new(|| Err("post-arrival hook failed".into()));
        let barrier = Barrier::with_action(
            PrimitiveId(2),
            BarrierConfig::new(2),
            Some(action),
            Collector::new(),
        );

        let barrier_clone = Arc::clone(&barrier);
        let handle = thread::spawn(move || barrier_clone.wait(Some(Duration::from_secs(5))));
        thread::sleep(Duration::from_millis(50));

        let leader = barrier.wait(Some(Duration::from_secs(5)));
        assert!(matches!(leader, Err(SyncError::ActionFailed(_))));
        assert!(matches!(
            handle.join().unwrap(),
            Err(SyncError::ActionFailed(_))
        ));
        assert_eq!(barrier.stats().arrived, 0);
    }

    #[test]
    fn test_reset_fails_waiters() {
        let barrier = barrier(3);
        let barrier_clone = Arc::clone(&barrier);
        let handle = thread::spawn(move || barrier_clone.wait(Some(Duration::from_secs(5))));
        thread::sleep(Duration::from_millis(50));

        barrier.reset();
        assert!(matches!(handle.join().unwrap(), Err(SyncError::Reset(_))));
        assert_eq!(barrier.stats().arrived, 0);
    }

    #[test]
    fn test_destroy_fails_waiters() {
        let barrier = barrier(2);
        let barrier_clone = Arc::clone(&barrier);
        let handle = thread::spawn(move || barrier_clone.wait(Some(Duration::from_secs(5))));
        thread::sleep(Duration::from_millis(50));

        barrier.destroy();
        assert!(matches!(
            handle.join().unwrap(),
            Err(SyncError::Destroyed(_))
        ));
        assert!(matches!(
            barrier.wait(None),
            Err(SyncError::Destroyed(_))
        ));
    }

    #[test]
    fn test_cyclic_reuse() {
        let barrier = barrier(2);
        for generation in 0..3u64 {
            let barrier_clone = Arc::clone(&barrier);
            let handle =
                thread::spawn(move || barrier_clone.wait(Some(Duration::from_secs(5))));
            thread::sleep(Duration::from_millis(20));
            let leader = barrier.wait(Some(Duration::from_secs(5))).unwrap();
            assert_eq!(leader.generation, generation);
            assert_eq!(handle.join().unwrap().unwrap().generation, generation);
        }
        assert_eq!(barrier.stats().completions, 3);
    }
}
