/*!
 * Coordination Primitives
 *
 * Semaphore, barrier, and latch share one parking substrate: FIFO queues
 * of per-waiter slots resolved under the owning primitive's lock, with
 * timeout decided by the waiter in a decide-and-commit step. The atomic
 * engine and race detector round out the module; the registry owns live
 * instances and wires them all to one Collector.
 */

pub mod atomic;
pub mod barrier;
pub mod latch;
pub mod race;
pub mod registry;
pub mod semaphore;
mod waiter;

pub use atomic::{AtomicEngine, AtomicTarget, BackoffPolicy, FnTarget, MutexCell, RetryConfig};
pub use barrier::{Barrier, BarrierAction, BarrierConfig, BarrierStats, BarrierWaitResult};
pub use latch::{CountdownLatch, LatchConfig, LatchStats};
pub use race::{RaceConfig, RaceDetector, RaceStats, Violation};
pub use registry::{ComponentStats, PrimitiveHandle, SyncRegistry};
pub use semaphore::{Semaphore, SemaphoreConfig, SemaphoreStats};
