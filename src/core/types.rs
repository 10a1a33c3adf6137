/*!
 * Core Types
 * Common types used across the coordination library
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Primitive ID - identifies a registered coordination primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrimitiveId(pub u64);

/// Task ID - identifies a task submitted to a worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task priority (0-255, lower value is served first)
pub type Priority = u8;

/// Common result type for primitive operations
pub type SyncResult<T> = Result<T, super::errors::SyncError>;

/// Kind tag for registered primitives (enumeration and health reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Semaphore,
    Barrier,
    Latch,
    Pool,
    RaceDetector,
}

impl PrimitiveKind {
    /// Stable name used in metric keys and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveKind::Semaphore => "semaphore",
            PrimitiveKind::Barrier => "barrier",
            PrimitiveKind::Latch => "latch",
            PrimitiveKind::Pool => "pool",
            PrimitiveKind::RaceDetector => "race_detector",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(PrimitiveId(7).to_string(), "7");
        assert_eq!(TaskId(42).to_string(), "42");
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(PrimitiveKind::Semaphore.as_str(), "semaphore");
        assert_eq!(PrimitiveKind::Pool.to_string(), "pool");
    }
}
