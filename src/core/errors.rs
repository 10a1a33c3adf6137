/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by blocking primitives (semaphore, barrier, latch)
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SyncError {
    #[error("Timed out waiting on {0}")]
    #[diagnostic(
        code(sync::timeout),
        help("The deadline elapsed before the primitive was granted. Increase the timeout or reduce contention.")
    )]
    Timeout(String),

    #[error("Primitive destroyed while waiting: {0}")]
    #[diagnostic(
        code(sync::destroyed),
        help("The primitive was torn down while callers were parked. Pending waiters are failed fast, never leaked.")
    )]
    Destroyed(String),

    #[error("Barrier reset while waiting: {0}")]
    #[diagnostic(
        code(sync::reset),
        help("A reset() force-failed all parked parties. Re-issue the wait if the rendezvous should be retried.")
    )]
    Reset(String),

    #[error("Barrier action failed: {0}")]
    #[diagnostic(
        code(sync::action_failed),
        help("The on-all-arrived action returned an error; the rendezvous is failed for every party.")
    )]
    ActionFailed(String),

    #[error("Primitive {0} not found in registry")]
    #[diagnostic(
        code(sync::not_found),
        help("The primitive may have been destroyed or garbage-collected by a recovery sweep.")
    )]
    NotFound(u64),
}

/// Worker pool errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum PoolError {
    #[error("Task queue full: {0}")]
    #[diagnostic(
        code(pool::queue_full),
        help("The pending-task queue is at capacity. Wait for workers to drain it or raise queue_capacity.")
    )]
    QueueFull(String),

    #[error("Pool is shutting down: {0}")]
    #[diagnostic(
        code(pool::shutting_down),
        help("destroy() was called; no new tasks are accepted during the drain.")
    )]
    ShuttingDown(String),

    #[error("Drain deadline exceeded: {0}")]
    #[diagnostic(
        code(pool::drain_timeout),
        help("Queued or in-flight work did not finish within drain_timeout. Remaining tasks were discarded.")
    )]
    DrainTimeout(String),
}

/// Optimistic update errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum AtomicError {
    #[error("Update failed after {attempts} attempts")]
    #[diagnostic(
        code(atomic::retry_exhausted),
        help("Every optimistic attempt observed a conflicting write. Raise max_retries or widen the backoff.")
    )]
    RetryExhausted { attempts: u32 },
}

/// Diagnostics and recovery errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum DiagnosticsError {
    #[error("Recovery gave up after {attempts} attempts")]
    #[diagnostic(
        code(diagnostics::recovery_failed),
        help("The component stayed unhealthy through every bounded recovery cycle. Inspect the alert history.")
    )]
    RecoveryFailed { attempts: u32 },

    #[error("Controller already running: {0}")]
    #[diagnostic(
        code(diagnostics::already_running),
        help("start() is idempotent-hostile on purpose; stop() the existing loop first.")
    )]
    AlreadyRunning(String),

    #[error("Metric collection failed: {0}")]
    #[diagnostic(
        code(diagnostics::collection_failed),
        help("A component stats snapshot could not be taken; the issue is folded into the next health check.")
    )]
    CollectionFailed(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(diagnostics::invalid_config),
        help("Check that intervals, windows, and attempt counts are non-zero where required.")
    )]
    InvalidConfig(String),
}
