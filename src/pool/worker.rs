/*!
 * Worker Loop
 * One OS thread per logical worker, coordinated through the pool's
 * mutex/condvar pair instead of busy-flag polling
 */

use super::WorkerPool;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

/// Worker body: pull highest-priority work, run it, account it, and
/// self-terminate on shutdown or idle eviction.
pub(super) fn run(pool: Arc<WorkerPool>, worker_id: u64) {
    tracing::debug!(pool = %pool.id(), worker_id, "worker started");

    loop {
        let entry = {
            let mut state = pool.state.lock();
            loop {
                if let Some(entry) = state.queue.pop() {
                    state.busy += 1;
                    break entry;
                }

                if state.shutdown {
                    state.workers -= 1;
                    if state.workers == 0 {
                        pool.drained.notify_all();
                    }
                    drop(state);
                    tracing::debug!(pool = %pool.id(), worker_id, "worker exiting on shutdown");
                    return;
                }

                state.idle += 1;
                let timed_out = pool
                    .work_available
                    .wait_for(&mut state, pool.config.idle_timeout)
                    .timed_out();
                state.idle -= 1;
                if !timed_out {
                    // This wake consumed exactly one submission signal
                    state.wakeups = state.wakeups.saturating_sub(1);
                }

                // Evict only when genuinely idle and the pool stays at or
                // above its floor
                if timed_out
                    && state.queue.is_empty()
                    && !state.shutdown
                    && state.workers > pool.config.min_size
                {
                    state.workers -= 1;
                    let remaining = state.workers;
                    drop(state);
                    pool.note_shrank(remaining);
                    tracing::debug!(pool = %pool.id(), worker_id, "worker evicted after idle timeout");
                    return;
                }
            }
        };

        let task_id = entry.id;
        let queued_for = entry.submitted_at.elapsed();
        let job = entry.job;
        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(job));
        let elapsed = start.elapsed();

        let metrics = pool.collector.metrics();
        metrics.record_wait("pool", queued_for);
        metrics.record_operation("pool", elapsed, outcome.is_ok());

        match outcome {
            Ok(()) => {
                pool.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                // A panicking task never takes its worker down with it
                pool.panicked.fetch_add(1, Ordering::Relaxed);
                pool.collector.task_panicked(pool.id(), task_id);
                tracing::error!(pool = %pool.id(), worker_id, task = %task_id, "task panicked");
            }
        }

        let mut state = pool.state.lock();
        state.busy -= 1;
        if state.shutdown && state.queue.is_empty() && state.busy == 0 {
            pool.drained.notify_all();
        }
    }
}
