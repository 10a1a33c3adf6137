/*!
 * Concord
 * In-process coordination primitives with self-healing diagnostics
 *
 * Semaphores, barriers, countdown latches, an elastic worker pool, an
 * optimistic atomic-update engine, and a race-condition detector, all
 * reporting into one observability pipeline. A diagnostics controller
 * polls the lot on an interval, flags anomalies and threshold breaches,
 * de-duplicates alerts, and runs bounded automatic recovery.
 */

pub mod core;
pub mod monitoring;
pub mod pool;
pub mod sync;

// Re-exports
pub use crate::core::{
    AtomicError, DiagnosticsError, IdGenerator, PoolError, PrimitiveId, PrimitiveKind, Priority,
    SyncError, SyncResult, TaskId,
};
pub use monitoring::{
    init_tracing, Alert, Collector, DiagnosticsConfig, DiagnosticsController, HealthSnapshot,
    HealthStatus, HealthThresholds, MetricsSnapshot, RecoveryConfig,
};
pub use pool::{PoolConfig, PoolStats, WorkerPool};
pub use sync::{
    AtomicEngine, AtomicTarget, BackoffPolicy, Barrier, BarrierConfig, BarrierWaitResult,
    ComponentStats, CountdownLatch, FnTarget, LatchConfig, MutexCell, PrimitiveHandle, RaceConfig,
    RaceDetector, RetryConfig, Semaphore, SemaphoreConfig, SyncRegistry, Violation,
};
