/*!
 * Counting Semaphore
 * Permit-counted exclusion with strict FIFO waiters and acquire deadlines
 *
 * # Fairness
 *
 * release() hands a freed permit directly to the head of the wait queue;
 * the permit never returns to the pool while waiters are parked, so a late
 * try_acquire() cannot steal it. Invariant: available + held == total.
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

/// Semaphore configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemaphoreConfig {
    /// Total permits available to concurrent holders
    pub permits: u32,
    /// Deadline applied when acquire() is called without an explicit timeout
    pub default_timeout: Duration,
}

impl Default for SemaphoreConfig {
    fn default() -> Self {
        Self {
            permits: limits::DEFAULT_PERMITS,
            default_timeout: limits::DEFAULT_WAIT_TIMEOUT,
        }
    }
}

impl SemaphoreConfig {
    pub fn new(permits: u32) -> Self {
        Self {
            permits,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

#[derive(Debug)]
struct SemState {
    available: u32,
    queue: VecDeque<WaitEntry<()>>,
    destroyed: bool,
}

/// Counting semaphore with FIFO waiters
pub struct Semaphore {
    id: PrimitiveId,
    total: u32,
    default_timeout: Duration,
    state: Mutex<SemState>,
    collector: Collector,

    acquires: AtomicU64,
    timeouts: AtomicU64,
    peak_waiters: AtomicU64,
}

impl Semaphore {
    pub fn new(id: PrimitiveId, config: SemaphoreConfig, collector: Collector) -> Arc<Self> {
        let sem = Arc::new(Self {
            id,
            total: config.permits,
            default_timeout: config.default_timeout,
            state: Mutex::new(SemState {
                available: config.permits,
                queue: VecDeque::new(),
                destroyed: false,
            }),
            collector: collector.clone(),
            acquires: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            peak_waiters: AtomicU64::new(0),
        });
        collector.primitive_created(id, "semaphore");
        sem
    }

    pub fn id(&self) -> PrimitiveId {
        self.id
    }

    /// Acquire one permit, parking FIFO behind earlier callers.
    ///
    /// `timeout` of `None` uses the configured default deadline.
    pub fn acquire(&self, timeout: Option<Duration>) -> SyncResult<()> {
        let timeout = timeout.unwrap_or_else(|| self.configured_timeout());
        let entry = {
            let mut state = self.state.lock();
            if state.destroyed {
                return Err(SyncError::Destroyed(format!("semaphore {}", self.id)));
            }

            if state.available > 0 && state.queue.is_empty() {
                state.available -= 1;
                self.acquires.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }

            let entry = WaitEntry::new();
            state.queue.push_back(WaitEntry {
                slot: Arc::clone(&entry.slot),
                enqueued_at: entry.enqueued_at,
            });
            self.note_peak(state.queue.len());
            entry
        };

        self.park(entry, timeout)
    }

    /// Non-blocking acquire; never queues.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.destroyed || state.available == 0 || !state.queue.is_empty() {
            return false;
        }
        state.available -= 1;
        self.acquires.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Release one permit. A parked waiter receives it directly.
    pub fn release(&self) -> SyncResult<()> {
        let mut state = self.state.lock();
        if state.destroyed {
            return Err(SyncError::Destroyed(format!("semaphore {}", self.id)));
        }

        if let Some(entry) = state.queue.pop_front() {
            // Direct handoff: the permit skips the pool entirely
            self.acquires.fetch_add(1, Ordering::Relaxed);
            self.collector
                .metrics()
                .record_wait("semaphore", entry.enqueued_at.elapsed());
            entry.slot.grant(());
            return Ok(());
        }

        if state.available >= self.total {
            // Over-release: clamp rather than corrupt the permit invariant
            tracing::warn!(semaphore = %self.id, "release without matching acquire");
            self.collector.emit(
                crate::monitoring::Event::new(
                    crate::monitoring::Severity::Warn,
                    crate::monitoring::Category::Semaphore,
                    crate::monitoring::Payload::OverRelease {
                        held: self.total - state.available,
                    },
                )
                .with_primitive(self.id),
            );
            return Ok(());
        }

        state.available += 1;
        Ok(())
    }

    /// Tear down the semaphore, failing every parked waiter with Destroyed.
    pub fn destroy(&self) {
        let failed = {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            let waiters: Vec<_> = state.queue.drain(..).collect();
            state.available = 0;
            waiters
        };

        for entry in &failed {
            entry
                .slot
                .fail(SyncError::Destroyed(format!("semaphore {}", self.id)));
        }
        self.collector
            .primitive_destroyed(self.id, "semaphore", failed.len());
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    /// Recovery action: restore the full permit pool, granting parked
    /// waiters first. Returns the number of waiters released.
    pub fn force_release(&self) -> usize {
        let granted = {
            let mut state = self.state.lock();
            if state.destroyed {
                return 0;
            }
            state.available = self.total;
            let mut granted = Vec::new();
            while state.available > 0 {
                match state.queue.pop_front() {
                    Some(entry) => {
                        state.available -= 1;
                        granted.push(entry);
                    }
                    None => break,
                }
            }
            granted
        };

        for entry in &granted {
            entry.slot.grant(());
        }
        if !granted.is_empty() {
            self.acquires
                .fetch_add(granted.len() as u64, Ordering::Relaxed);
            self.collector.emit(
                crate::monitoring::Event::new(
                    crate::monitoring::Severity::Info,
                    crate::monitoring::Category::Semaphore,
                    crate::monitoring::Payload::WaitersReleased {
                        kind: "semaphore".into(),
                        count: granted.len(),
                    },
                )
                .with_primitive(self.id),
            );
        }
        granted.len()
    }

    /// Point-in-time statistics
    pub fn stats(&self) -> SemaphoreStats {
        let state = self.state.lock();
        SemaphoreStats {
            permits: self.total,
            available: state.available,
            waiting: state.queue.len(),
            acquires: self.acquires.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            peak_waiters: self.peak_waiters.load(Ordering::Relaxed) as usize,
            destroyed: state.destroyed,
        }
    }

    fn park(&self, entry: WaitEntry<()>, timeout: Duration) -> SyncResult<()> {
        let deadline = entry.enqueued_at + timeout;

        if let Some(resolution) = entry.slot.park_until(deadline) {
            return resolution;
        }

        // Deadline elapsed while pending: decide-and-commit. Only if we are
        // still queued does the timeout win; a racing grant already removed
        // us and its resolution stands.
        let mut state = self.state.lock();
        if let Some(pos) = state
            .queue
            .iter()
            .position(|e| Arc::ptr_eq(&e.slot, &entry.slot))
        {
            state.queue.remove(pos);
            drop(state);
            self.timeouts.fetch_add(1, Ordering::Relaxed);
            self.collector
                .acquire_timeout(self.id, "semaphore", timeout);
            return Err(SyncError::Timeout(format!("semaphore {}", self.id)));
        }
        drop(state);

        match entry.slot.resolution() {
            Some(resolution) => resolution,
            // Unreachable in practice: dequeue and resolve happen under the
            // state lock we just released
            None => Err(SyncError::Timeout(format!("semaphore {}", self.id))),
        }
    }

    fn note_peak(&self, waiters: usize) {
        self.peak_waiters
            .fetch_max(waiters as u64, Ordering::Relaxed);
        self.collector
            .metrics()
            .set_gauge_max("semaphore.peak_waiters", waiters as f64);
    }

    fn configured_timeout(&self) -> Duration {
        self.default_timeout
    }
}

/// Snapshot of semaphore state for diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemaphoreStats {
    pub permits: u32,
    pub available: u32,
    pub waiting: usize,
    pub acquires: u64,
    pub timeouts: u64,
    pub peak_waiters: usize,
    pub destroyed: bool,
}
