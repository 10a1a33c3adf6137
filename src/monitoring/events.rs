/*!
 * Event System
 * Strongly-typed observability events for coordination primitives
 */

use crate::core::types::{PrimitiveId, TaskId};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Event severity for filtering and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Severity {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Critical = 5,
}

/// Event category for organization and querying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Category {
    Semaphore,
    Barrier,
    Latch,
    Pool,
    Atomic,
    Race,
    Registry,
    Health,
    Recovery,
}

/// Unified event type - all observability events flow through this
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic timestamp (nanoseconds since first event)
    pub timestamp_ns: u64,
    /// Event severity
    pub severity: Severity,
    /// Event category
    pub category: Category,
    /// Originating primitive if applicable
    pub primitive: Option<PrimitiveId>,
    /// Event payload
    pub payload: Payload,
}

/// Event payload - strongly typed variants for each event type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    // Primitive lifecycle
    PrimitiveCreated {
        kind: String,
    },
    PrimitiveDestroyed {
        kind: String,
        failed_waiters: usize,
    },

    // Waiting
    AcquireTimeout {
        kind: String,
        waited_ms: u64,
    },
    WaitersReleased {
        kind: String,
        count: usize,
    },
    OverRelease {
        held: u32,
    },

    // Worker pool
    TaskRejected {
        queued: usize,
        capacity: usize,
    },
    TaskPanicked {
        task_id: TaskId,
    },
    PoolGrew {
        workers: usize,
    },
    PoolShrank {
        workers: usize,
    },

    // Race detection
    RaceDetected {
        resource: String,
        operations: Vec<String>,
        max_concurrent: usize,
    },

    // Diagnostics
    AnomalyDetected {
        metric: String,
        value: f64,
        expected: f64,
        deviation: f64,
    },
    ThresholdBreached {
        metric: String,
        value: f64,
        limit: f64,
    },
    AlertRaised {
        alert_type: String,
        occurrences: u32,
    },
    AlertResolved {
        alert_type: String,
    },
    HealthChanged {
        from: String,
        to: String,
        issues: usize,
    },

    // Recovery
    RecoveryStarted {
        component: String,
        attempt: u32,
    },
    RecoverySucceeded {
        component: String,
        attempts: u32,
    },
    RecoveryFailed {
        component: String,
        attempts: u32,
    },
}

impl Event {
    /// Create a new event with current timestamp
    #[inline]
    pub fn new(severity: Severity, category: Category, payload: Payload) -> Self {
        Self {
            timestamp_ns: Self::now_ns(),
            severity,
            category,
            primitive: None,
            payload,
        }
    }

    /// Attach the originating primitive
    #[inline]
    pub fn with_primitive(mut self, id: PrimitiveId) -> Self {
        self.primitive = Some(id);
        self
    }

    /// Get current time in nanoseconds (monotonic)
    #[inline]
    pub(crate) fn now_ns() -> u64 {
        static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
        let start = START.get_or_init(Instant::now);
        start.elapsed().as_nanos() as u64
    }

    /// Get event age
    #[inline]
    pub fn age(&self) -> Duration {
        Duration::from_nanos(Self::now_ns().saturating_sub(self.timestamp_ns))
    }

    /// Check if event matches filter criteria
    #[inline]
    pub fn matches(&self, filter: &EventFilter) -> bool {
        if let Some(min_severity) = filter.min_severity {
            if self.severity < min_severity {
                return false;
            }
        }

        if let Some(category) = filter.category {
            if self.category != category {
                return false;
            }
        }

        if let Some(primitive) = filter.primitive {
            if self.primitive != Some(primitive) {
                return false;
            }
        }

        true
    }
}

/// Event filter for querying
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub min_severity: Option<Severity>,
    pub category: Option<Category>,
    pub primitive: Option<PrimitiveId>,
}

impl EventFilter {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn severity(mut self, severity: Severity) -> Self {
        self.min_severity = Some(severity);
        self
    }

    #[inline]
    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    #[inline]
    pub fn primitive(mut self, id: PrimitiveId) -> Self {
        self.primitive = Some(id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = Event::new(
            Severity::Info,
            Category::Semaphore,
            Payload::PrimitiveCreated {
                kind: "semaphore".into(),
            },
        );

        assert_eq!(event.severity, Severity::Info);
        assert_eq!(event.category, Category::Semaphore);
        assert!(event.primitive.is_none());
    }

    #[test]
    fn test_event_filter() {
        let event = Event::new(
            Severity::Warn,
            Category::Pool,
            Payload::TaskRejected {
                queued: 128,
                capacity: 128,
            },
        )
        .with_primitive(PrimitiveId(3));

        let filter = EventFilter::new()
            .severity(Severity::Info)
            .category(Category::Pool)
            .primitive(PrimitiveId(3));
        assert!(event.matches(&filter));

        let filter = EventFilter::new().severity(Severity::Error);
        assert!(!event.matches(&filter));

        let filter = EventFilter::new().primitive(PrimitiveId(4));
        assert!(!event.matches(&filter));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warn);
        assert!(Severity::Warn > Severity::Info);
        assert!(Severity::Critical > Severity::Error);
    }
}
