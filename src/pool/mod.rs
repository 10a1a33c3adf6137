/*!
 * Worker Pool
 * Bounded elastic pool pulling from a priority task queue
 *
 * The pool grows a worker per submission while below max_size and no
 * worker is idle; workers above min_size self-terminate after
 * idle_timeout. destroy() is a graceful drain bounded by drain_timeout.
 */

mod task;
mod worker;

use crate::core::errors::PoolError;
use crate::core::id::IdGenerator;
use crate::core::limits;
use crate::core::types::{PrimitiveId, Priority, TaskId};
use crate::monitoring::Collector;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use task::TaskEntry;

/// Pool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Workers kept alive even when idle
    pub min_size: usize,
    /// Hard ceiling on concurrent workers
    pub max_size: usize,
    /// Idle duration after which a worker above min_size exits
    pub idle_timeout: Duration,
    /// Pending-task queue capacity; submissions beyond it are rejected
    pub queue_capacity: usize,
    /// Deadline for destroy() to drain queued and in-flight work
    pub drain_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: limits::DEFAULT_POOL_MIN,
            max_size: limits::DEFAULT_POOL_MAX,
            idle_timeout: limits::DEFAULT_IDLE_TIMEOUT,
            queue_capacity: limits::DEFAULT_QUEUE_CAPACITY,
            drain_timeout: limits::DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl PoolConfig {
    pub fn new(min_size: usize, max_size: usize) -> Self {
        Self {
            min_size,
            max_size: max_size.max(min_size.max(1)),
            ..Default::default()
        }
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}

pub(crate) struct PoolState {
    pub queue: BinaryHeap<TaskEntry>,
    pub seq: u64,
    pub workers: usize,
    pub busy: usize,
    pub idle: usize,
    /// Notifications sent but not yet consumed by a waking worker; an
    /// idle worker that was already signalled must not absorb a second
    /// submission, or the pool under-grows
    pub wakeups: usize,
    pub shutdown: bool,
}

/// Bounded elastic worker pool
pub struct WorkerPool {
    id: PrimitiveId,
    /// Handle back to our own Arc so execute() can spawn worker threads
    self_ref: Weak<WorkerPool>,
    pub(crate) config: PoolConfig,
    pub(crate) state: Mutex<PoolState>,
    pub(crate) work_available: Condvar,
    pub(crate) drained: Condvar,
    pub(crate) collector: Collector,
    task_ids: IdGenerator,

    pub(crate) completed: AtomicU64,
    rejected: AtomicU64,
    pub(crate) panicked: AtomicU64,
    peak_workers: AtomicU64,
    peak_queue: AtomicU64,
    next_worker: AtomicU64,
}

impl WorkerPool {
    pub fn new(id: PrimitiveId, config: PoolConfig, collector: Collector) -> Arc<Self> {
        let pool = Arc::new_cyclic(|weak| Self {
            id,
            self_ref: weak.clone(),
            config: config.clone(),
            state: Mutex::new(PoolState {
                queue: BinaryHeap::new(),
                seq: 0,
                workers: 0,
                busy: 0,
                idle: 0,
                wakeups: 0,
                shutdown: false,
            }),
            work_available: Condvar::new(),
            drained: Condvar::new(),
            collector: collector.clone(),
            task_ids: IdGenerator::new(),
            completed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            peak_workers: AtomicU64::new(0),
            peak_queue: AtomicU64::new(0),
            next_worker: AtomicU64::new(1),
        });
        collector.primitive_created(id, "pool");

        {
            let mut state = pool.state.lock();
            for _ in 0..config.min_size {
                Self::spawn_worker(&pool, &mut state);
            }
        }
        pool
    }

    pub fn id(&self) -> PrimitiveId {
        self.id
    }

    /// Submit a task at the given priority (lower value runs first).
    pub fn execute(
        &self,
        priority: Priority,
        job: impl FnOnce() + Send + 'static,
    ) -> Result<TaskId, PoolError> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(PoolError::ShuttingDown(format!("pool {}", self.id)));
        }

        if state.queue.len() >= self.config.queue_capacity {
            drop(state);
            self.rejected.fetch_add(1, Ordering::Relaxed);
            self.collector.task_rejected(
                self.id,
                self.config.queue_capacity,
                self.config.queue_capacity,
            );
            return Err(PoolError::QueueFull(format!(
                "pool {} at {}",
                self.id, self.config.queue_capacity
            )));
        }

        let task_id = self.task_ids.next_task();
        state.seq += 1;
        let seq = state.seq;
        state.queue.push(TaskEntry {
            id: task_id,
            priority,
            seq,
            submitted_at: Instant::now(),
            job: Box::new(job),
        });

        let depth = state.queue.len() as u64;
        self.peak_queue.fetch_max(depth, Ordering::Relaxed);
        self.collector
            .metrics()
            .set_gauge_max("pool.peak_queue_depth", depth as f64);

        if state.idle > state.wakeups {
            state.wakeups += 1;
            self.work_available.notify_one();
        } else if state.workers < self.config.max_size {
            if let Some(pool) = self.self_ref.upgrade() {
                Self::spawn_worker(&pool, &mut state);
            }
        }

        Ok(task_id)
    }

    /// Graceful drain: reject new work, finish queued and in-flight tasks,
    /// then clear all state. Bounded by drain_timeout.
    pub fn destroy(&self) -> Result<(), PoolError> {
        let deadline = Instant::now() + self.config.drain_timeout;
        let mut state = self.state.lock();
        if !state.shutdown {
            state.shutdown = true;
            self.work_available.notify_all();
        }

        while state.workers > 0 || state.busy > 0 || !state.queue.is_empty() {
            if self.drained.wait_until(&mut state, deadline).timed_out() {
                let dropped = state.queue.len();
                state.queue.clear();
                drop(state);
                tracing::warn!(pool = %self.id, dropped, "drain deadline exceeded");
                self.collector.primitive_destroyed(self.id, "pool", dropped);
                return Err(PoolError::DrainTimeout(format!(
                    "pool {} dropped {} tasks",
                    self.id, dropped
                )));
            }
        }
        drop(state);

        self.collector.primitive_destroyed(self.id, "pool", 0);
        Ok(())
    }

    /// Recovery action: discard queued (not yet started) tasks.
    pub fn drain_queue(&self) -> usize {
        let mut state = self.state.lock();
        let dropped = state.queue.len();
        state.queue.clear();
        if dropped > 0 {
            tracing::info!(pool = %self.id, dropped, "pending queue drained by recovery");
        }
        dropped
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().shutdown
    }

    /// Point-in-time statistics
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            min_size: self.config.min_size,
            max_size: self.config.max_size,
            workers: state.workers,
            busy: state.busy,
            idle: state.idle,
            queued: state.queue.len(),
            queue_capacity: self.config.queue_capacity,
            completed: self.completed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            peak_workers: self.peak_workers.load(Ordering::Relaxed) as usize,
            peak_queue_depth: self.peak_queue.load(Ordering::Relaxed) as usize,
            destroyed: state.shutdown,
        }
    }

    /// Spawn a worker thread; called with the state lock held so the
    /// max_size bound is enforced atomically with the count.
    fn spawn_worker(pool: &Arc<Self>, state: &mut PoolState) {
        state.workers += 1;
        let workers = state.workers as u64;
        pool.peak_workers.fetch_max(workers, Ordering::Relaxed);
        pool.collector
            .metrics()
            .set_gauge_max("pool.peak_workers", workers as f64);

        let worker_id = pool.next_worker.fetch_add(1, Ordering::Relaxed);
        let pool_clone = Arc::clone(pool);
        let spawned = std::thread::Builder::new()
            .name(format!("concord-worker-{}-{}", pool.id, worker_id))
            .spawn(move || worker::run(pool_clone, worker_id));

        match spawned {
            Ok(_) => {
                pool.collector.emit(
                    crate::monitoring::Event::new(
                        crate::monitoring::Severity::Debug,
                        crate::monitoring::Category::Pool,
                        crate::monitoring::Payload::PoolGrew {
                            workers: state.workers,
                        },
                    )
                    .with_primitive(pool.id),
                );
            }
            Err(err) => {
                state.workers -= 1;
                tracing::error!(pool = %pool.id, error = %err, "failed to spawn worker");
            }
        }
    }

    pub(crate) fn note_shrank(&self, remaining: usize) {
        self.collector.emit(
            crate::monitoring::Event::new(
                crate::monitoring::Severity::Debug,
                crate::monitoring::Category::Pool,
                crate::monitoring::Payload::PoolShrank { workers: remaining },
            )
            .with_primitive(self.id),
        );
    }
}

/// Snapshot of pool state for diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    pub min_size: usize,
    pub max_size: usize,
    pub workers: usize,
    pub busy: usize,
    pub idle: usize,
    pub queued: usize,
    pub queue_capacity: usize,
    pub completed: u64,
    pub rejected: u64,
    pub panicked: u64,
    pub peak_workers: usize,
    pub peak_queue_depth: usize,
    pub destroyed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn pool(min: usize, max: usize) -> Arc<WorkerPool> {
        WorkerPool::new(
            PrimitiveId(1),
            PoolConfig::new(min, max)
                .with_idle_timeout(Duration::from_millis(100))
                .with_queue_capacity(16),
            Collector::new(),
        )
    }

    #[test]
    fn test_executes_submitted_tasks() {
        let pool = pool(1, 2);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            pool.execute(4, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(pool.stats().completed, 5);
    }

    #[test]
    fn test_priority_order_single_worker() {
        let pool = pool(1, 1);
        let order = Arc::new(Mutex::new(Vec::new()));

        // Occupy the single worker so later submissions queue up
        let gate = Arc::new(Mutex::new(()));
        let guard = gate.lock();
        {
            let gate = Arc::clone(&gate);
            pool.execute(0, move || {
                let _ = gate.lock();
            })
            .unwrap();
        }
        std::thread::sleep(Duration::from_millis(50));

        for (priority, name) in [(5u8, "low"), (0u8, "high"), (5u8, "low2")] {
            let order = Arc::clone(&order);
            pool.execute(priority, move || {
                order.lock().push(name);
            })
            .unwrap();
        }

        drop(guard);
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(*order.lock(), vec!["high", "low", "low2"]);
    }

    #[test]
    fn test_queue_full_rejection() {
        let pool = WorkerPool::new(
            PrimitiveId(2),
            PoolConfig::new(1, 1)
                .with_queue_capacity(2)
                .with_idle_timeout(Duration::from_millis(100)),
            Collector::new(),
        );

        // Block the only worker
        let gate = Arc::new(Mutex::new(()));
        let guard = gate.lock();
        {
            let gate = Arc::clone(&gate);
            pool.execute(0, move || {
                let _ = gate.lock();
            })
            .unwrap();
        }
        std::thread::sleep(Duration::from_millis(50));

        pool.execute(1, || {}).unwrap();
        pool.execute(1, || {}).unwrap();
        let result = pool.execute(1, || {});
        assert!(matches!(result, Err(PoolError::QueueFull(_))));
        assert_eq!(pool.stats().rejected, 1);

        drop(guard);
    }

    #[test]
    fn test_panicking_task_keeps_worker_alive() {
        let pool = pool(1, 1);
        pool.execute(0, || panic!("boom")).unwrap();
        std::thread::sleep(Duration::from_millis(100));

        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        pool.execute(0, move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let stats = pool.stats();
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.workers, 1);
    }

    #[test]
    fn test_destroy_drains_and_rejects() {
        let pool = pool(1, 2);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let counter = Arc::clone(&counter);
            pool.execute(3, move || {
                std::thread::sleep(Duration::from_millis(10));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.destroy().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert!(matches!(
            pool.execute(0, || {}),
            Err(PoolError::ShuttingDown(_))
        ));
        assert_eq!(pool.stats().workers, 0);
    }
}
