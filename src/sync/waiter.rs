/*!
 * Waiter Parking
 *
 * Per-waiter parking slots built on parking_lot's Mutex/Condvar.
 *
 * # Design
 *
 * Each blocked caller owns one slot; the primitive keeps the slots in an
 * arrival-ordered queue and resolves them under its own state lock. A slot
 * is resolved exactly once (granted or failed). Timeouts are decided by the
 * waiter itself with a decide-and-commit step: the waiter re-takes the
 * primitive lock, and only if it is still queued does the timeout win —
 * a racing grant always takes precedence. Lock order is primitive state
 * first, slot second, on every path.
 */

use crate::core::errors::SyncError;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Instant;

/// Resolution state of a parked waiter
#[derive(Debug, Clone)]
enum Outcome<T> {
    Pending,
    Granted(T),
    Failed(SyncError),
}

/// One parked waiter. `T` is the grant payload (unit for semaphores and
/// latches, the released generation for barriers).
#[derive(Debug)]
pub(crate) struct WaitSlot<T> {
    state: Mutex<Outcome<T>>,
    cv: Condvar,
}

impl<T: Clone> WaitSlot<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(Outcome::Pending),
            cv: Condvar::new(),
        })
    }

    /// Resolve the slot with a grant. Called while the owning primitive's
    /// state lock is held, so a waiter that re-checks under that lock
    /// always observes the resolution.
    pub fn grant(&self, value: T) {
        let mut state = self.state.lock();
        if matches!(*state, Outcome::Pending) {
            *state = Outcome::Granted(value);
            self.cv.notify_one();
        }
    }

    /// Resolve the slot with a failure (destroy, reset, action error).
    pub fn fail(&self, err: SyncError) {
        let mut state = self.state.lock();
        if matches!(*state, Outcome::Pending) {
            *state = Outcome::Failed(err);
            self.cv.notify_one();
        }
    }

    /// Park until resolved or the deadline passes.
    ///
    /// `None` means the deadline elapsed while still pending; the caller
    /// must then run its decide-and-commit step under the primitive lock
    /// and either dequeue itself or pick up the racing resolution via
    /// [`WaitSlot::resolution`].
    pub fn park_until(&self, deadline: Instant) -> Option<Result<T, SyncError>> {
        let mut state = self.state.lock();
        loop {
            match &*state {
                Outcome::Granted(value) => return Some(Ok(value.clone())),
                Outcome::Failed(err) => return Some(Err(err.clone())),
                Outcome::Pending => {}
            }

            if self.cv.wait_until(&mut state, deadline).timed_out() {
                return match &*state {
                    Outcome::Granted(value) => Some(Ok(value.clone())),
                    Outcome::Failed(err) => Some(Err(err.clone())),
                    Outcome::Pending => None,
                };
            }
        }
    }

    /// Read a resolution that raced the timeout. Only meaningful after the
    /// decide-and-commit step found the waiter already dequeued.
    pub fn resolution(&self) -> Option<Result<T, SyncError>> {
        match &*self.state.lock() {
            Outcome::Granted(value) => Some(Ok(value.clone())),
            Outcome::Failed(err) => Some(Err(err.clone())),
            Outcome::Pending => None,
        }
    }
}

/// Queue entry pairing a slot with its arrival timestamp (FIFO order and
/// wait-time metrics).
#[derive(Debug)]
pub(crate) struct WaitEntry<T> {
    pub slot: Arc<WaitSlot<T>>,
    pub enqueued_at: Instant,
}

impl<T: Clone> WaitEntry<T> {
    pub fn new() -> Self {
        Self {
            slot: WaitSlot::new(),
            enqueued_at: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_grant_wakes_parked_waiter() {
        let slot = WaitSlot::<()>::new();
        let slot_clone = Arc::clone(&slot);

        let handle = thread::spawn(move || {
            slot_clone.park_until(Instant::now() + Duration::from_secs(1))
        });

        thread::sleep(Duration::from_millis(50));
        slot.grant(());

        assert!(matches!(handle.join().unwrap(), Some(Ok(()))));
    }

    #[test]
    fn test_deadline_returns_none_while_pending() {
        let slot = WaitSlot::<()>::new();
        let start = Instant::now();
        let result = slot.park_until(Instant::now() + Duration::from_millis(50));

        assert!(result.is_none());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_fail_before_park_resolves_immediately() {
        let slot = WaitSlot::<()>::new();
        slot.fail(SyncError::Destroyed("gone".into()));

        let result = slot.park_until(Instant::now() + Duration::from_secs(1));
        assert!(matches!(result, Some(Err(SyncError::Destroyed(_)))));
    }

    #[test]
    fn test_first_resolution_wins() {
        let slot = WaitSlot::<u64>::new();
        slot.grant(7);
        slot.fail(SyncError::Reset("late".into()));

        assert!(matches!(slot.resolution(), Some(Ok(7))));
    }
}
