/*!
 * System Limits and Constants
 *
 * Centralized location for defaults, thresholds, and magic numbers.
 * All values include rationale comments explaining WHY they exist.
 */

use std::time::Duration;

// =============================================================================
// PRIMITIVE DEFAULTS
// =============================================================================

/// Default semaphore permit count
/// Small enough that exhaustion shows up quickly under contention
pub const DEFAULT_PERMITS: u32 = 1;

/// Default acquire/wait deadline for blocking primitives (30s)
/// Long enough for slow callers, short enough to surface stuck holders
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// WORKER POOL
// =============================================================================

/// Default minimum pool size
/// One resident worker keeps submission latency flat for bursty callers
pub const DEFAULT_POOL_MIN: usize = 1;

/// Default maximum pool size
/// Bounded so a task flood degrades into queueing, not thread explosion
pub const DEFAULT_POOL_MAX: usize = 8;

/// Default idle eviction timeout (30s)
/// Workers above min_size that see no work for this long self-terminate
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default pending-task queue capacity
/// Submissions beyond this are rejected with QueueFull
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default graceful-drain deadline for destroy() (10s)
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// OPTIMISTIC UPDATES
// =============================================================================

/// Default retry budget for compare-and-set loops
/// Conflicts are expected to be the exception; three retries absorb bursts
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default backoff base delay (1ms)
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(1);

/// Backoff delay ceiling (250ms)
/// Caps exponential growth so an exhausted retry loop stays responsive
pub const BACKOFF_CAP: Duration = Duration::from_millis(250);

// =============================================================================
// RACE DETECTION
// =============================================================================

/// Default sliding window for concurrent-operation tracking (1s)
pub const DEFAULT_RACE_WINDOW: Duration = Duration::from_secs(1);

/// Default maximum concurrent operations per resource before a violation
pub const DEFAULT_MAX_CONCURRENT: usize = 1;

/// Completed operation records kept beyond the window are pruned lazily;
/// hard cap on retained records per resource to bound memory
pub const RACE_RECORDS_PER_RESOURCE: usize = 1024;

// =============================================================================
// OBSERVABILITY
// =============================================================================

/// Event ring capacity (power of 2 for index math)
/// Bounds memory; producers drop (and count) events past this depth
pub const EVENT_RING_SIZE: usize = 4096;

/// Alert history retained by the alert manager
pub const ALERT_HISTORY_CAP: usize = 512;

/// Violation log retained per race detector
pub const VIOLATION_LOG_CAP: usize = 256;

// =============================================================================
// DIAGNOSTICS
// =============================================================================

/// Default health-check interval (5s)
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Rolling-statistics window (samples) for anomaly detection
/// Large enough to smooth noise, small enough to follow regime changes
pub const DEFAULT_ROLLING_WINDOW: usize = 60;

/// Minimum samples before anomaly detection engages
/// Below this the rolling stddev is too unstable to trust
pub const DEFAULT_ANOMALY_MIN_SAMPLES: usize = 10;

/// Z-score threshold for anomaly flagging (2 = ~95% confidence)
pub const DEFAULT_ANOMALY_SIGMA: f64 = 2.0;

/// Occurrences of the same alert type required before it surfaces
/// Suppresses single transient blips
pub const DEFAULT_ALERT_THRESHOLD: u32 = 3;

/// Window in which repeated occurrences count toward the alert threshold
pub const DEFAULT_ALERT_WINDOW: Duration = Duration::from_secs(60);

/// Bounded recovery attempts per unhealthy cycle
pub const DEFAULT_RECOVERY_ATTEMPTS: u32 = 3;

/// Base recovery delay; attempt N sleeps delay * N
pub const DEFAULT_RECOVERY_DELAY: Duration = Duration::from_millis(500);

/// Breach magnitude that escalates a warning to critical (2x the limit)
pub const CRITICAL_BREACH_MULTIPLIER: f64 = 2.0;
