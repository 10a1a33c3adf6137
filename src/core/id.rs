/*!
 * ID Generation
 * Sequential atomic generators for primitive and task identifiers
 */

use super::types::{PrimitiveId, TaskId};
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic ID source shared by a registry or pool.
///
/// IDs are never recycled: destroyed primitives keep their identity in
/// event history and alert payloads.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next raw ID
    #[inline]
    pub fn next_raw(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Allocate a primitive ID
    #[inline]
    pub fn next_primitive(&self) -> PrimitiveId {
        PrimitiveId(self.next_raw())
    }

    /// Allocate a task ID
    #[inline]
    pub fn next_task(&self) -> TaskId {
        TaskId(self.next_raw())
    }

    /// Current counter value (for debugging)
    pub fn current(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
