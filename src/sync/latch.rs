/*!
 * Countdown Latch
 * One-shot gate released when the counter reaches zero
 *
 * Once open the latch stays open: wait() returns immediately forever and
 * extra count_down() calls are no-ops. The count never goes below zero.
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

/// Latch configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatchConfig {
    /// Initial count; the latch opens when it reaches zero
    pub count: u32,
    /// Deadline applied when wait() is called without an explicit timeout
    pub default_timeout: Duration,
}

impl Default for LatchConfig {
    fn default() -> Self {
        Self {
            count: 1,
            default_timeout: limits::DEFAULT_WAIT_TIMEOUT,
        }
    }
}

impl LatchConfig {
    pub fn new(count: u32) -> Self {
        Self {
            count,
            ..Default::default()
        }
    }
}

#[derive(Debug)]
struct LatchState {
    remaining: u32,
    queue: VecDeque<WaitEntry<()>>,
    destroyed: bool,
}

/// One-shot countdown gate
pub struct CountdownLatch {
    id: PrimitiveId,
    initial: u32,
    default_timeout: Duration,
    state: Mutex<LatchState>,
    collector: Collector,

    timeouts: AtomicU64,
}

impl CountdownLatch {
    pub fn new(id: PrimitiveId, config: LatchConfig, collector: Collector) -> Arc<Self> {
        let latch = Arc::new(Self {
            id,
            initial: config.count,
            default_timeout: config.default_timeout,
            state: Mutex::new(LatchState {
                remaining: config.count,
                queue: VecDeque::new(),
                destroyed: false,
            }),
            collector: collector.clone(),
            timeouts: AtomicU64::new(0),
        });
        collector.primitive_created(id, "latch");
        latch
    }

    pub fn id(&self) -> PrimitiveId {
        self.id
    }

    /// Decrement the counter; reaching zero opens the latch and releases
    /// every parked waiter exactly once. Returns the remaining count.
    pub fn count_down(&self) -> u32 {
        let (remaining, released) = {
            let mut state = self.state.lock();
            if state.destroyed || state.remaining == 0 {
                return state.remaining;
            }

            state.remaining -= 1;
            if state.remaining > 0 {
                return state.remaining;
            }

            let waiters: Vec<_> = state.queue.drain(..).collect();
            (0, waiters)
        };

        for entry in &released {
            self.collector
                .metrics()
                .record_wait("latch", entry.enqueued_at.elapsed());
            entry.slot.grant(());
        }
        if !released.is_empty() {
            self.collector.emit(
                crate::monitoring::Event::new(
                    crate::monitoring::Severity::Debug,
                    crate::monitoring::Category::Latch,
                    crate::monitoring::Payload::WaitersReleased {
                        kind: "latch".into(),
                        count: released.len(),
                    },
                )
                .with_primitive(self.id),
            );
        }
        remaining
    }

    /// Park until the latch opens. Returns immediately once open.
    pub fn wait(&self, timeout: Option<Duration>) -> SyncResult<()> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let entry = {
            let mut state = self.state.lock();
            if state.destroyed {
                return Err(SyncError::Destroyed(format!("latch {}", self.id)));
            }
            if state.remaining == 0 {
                return Ok(());
            }

            let entry = WaitEntry::new();
            state.queue.push_back(WaitEntry {
                slot: Arc::clone(&entry.slot),
                enqueued_at: entry.enqueued_at,
            });
            entry
        };

        let deadline = entry.enqueued_at + timeout;
        if let Some(resolution) = entry.slot.park_until(deadline) {
            return resolution;
        }

        let mut state = self.state.lock();
        if let Some(pos) = state
            .queue
            .iter()
            .position(|e| Arc::ptr_eq(&e.slot, &entry.slot))
        {
            state.queue.remove(pos);
            drop(state);
            self.timeouts.fetch_add(1, Ordering::Relaxed);
            self.collector.acquire_timeout(self.id, "latch", timeout);
            return Err(SyncError::Timeout(format!("latch {}", self.id)));
        }
        drop(state);

        match entry.slot.resolution() {
            Some(resolution) => resolution,
            None => Err(SyncError::Timeout(format!("latch {}", self.id))),
        }
    }

    /// Current count (0 means open)
    pub fn count(&self) -> u32 {
        self.state.lock().remaining
    }

    /// Tear down the latch, failing every parked waiter with Destroyed.
    pub fn destroy(&self) {
        let failed = {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.queue.drain(..).collect::<Vec<_>>()
        };

        for entry in &failed {
            entry
                .slot
                .fail(SyncError::Destroyed(format!("latch {}", self.id)));
        }
        self.collector
            .primitive_destroyed(self.id, "latch", failed.len());
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    /// Point-in-time statistics
    pub fn stats(&self) -> LatchStats {
        let state = self.state.lock();
        LatchStats {
            initial: self.initial,
            remaining: state.remaining,
            waiting: state.queue.len(),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            destroyed: state.destroyed,
        }
    }
}

/// Snapshot of latch state for diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatchStats {
    pub initial: u32,
    pub remaining: u32,
    pub waiting: usize,
    pub timeouts: u64,
    pub destroyed: bool,
}
