/*!
 * Unified Collector
 * Central intake for all observability data
 *
 * Every primitive holds a Collector clone; operations report outcomes and
 * timings through it, and the diagnostics controller reads back snapshots
 * and subscribes to the event stream.
 */

use super::events::{Category, Event, Payload, Severity};
use super::metrics::{MetricsAggregator, MetricsSnapshot};
use super::stream::{EventStream, StreamStats, Subscriber};
use crate::core::types::{PrimitiveId, TaskId};
use std::sync::Arc;
use std::time::Duration;

/// Unified observability collector
pub struct Collector {
    stream: EventStream,
    metrics: Arc<MetricsAggregator>,
}

impl Collector {
    pub fn new() -> Self {
        Self {
            stream: EventStream::new(),
            metrics: Arc::new(MetricsAggregator::new()),
        }
    }

    /// Emit an event (primary API)
    #[inline]
    pub fn emit(&self, event: Event) {
        self.update_metrics(&event);
        let _ = self.stream.publish(event);
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> Subscriber {
        self.stream.subscribe()
    }

    /// Shared metrics aggregator
    pub fn metrics(&self) -> &Arc<MetricsAggregator> {
        &self.metrics
    }

    /// Get metrics snapshot
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Get stream statistics
    pub fn stream_stats(&self) -> StreamStats {
        self.stream.stats()
    }

    /// Keep aggregate counters current as events flow through
    fn update_metrics(&self, event: &Event) {
        match &event.payload {
            Payload::AcquireTimeout { kind, .. } => {
                self.metrics.inc_counter(&format!("{}.timeouts", kind), 1.0);
            }
            Payload::PrimitiveDestroyed { kind, .. } => {
                self.metrics
                    .inc_counter(&format!("{}.destroyed", kind), 1.0);
            }
            Payload::TaskRejected { .. } => {
                self.metrics.inc_counter("pool.rejected", 1.0);
            }
            Payload::TaskPanicked { .. } => {
                self.metrics.inc_counter("pool.panicked", 1.0);
            }
            Payload::RaceDetected { .. } => {
                self.metrics.inc_counter("race.detected", 1.0);
            }
            Payload::RecoveryFailed { .. } => {
                self.metrics.inc_counter("recovery.failed", 1.0);
            }
            Payload::RecoverySucceeded { .. } => {
                self.metrics.inc_counter("recovery.succeeded", 1.0);
            }
            _ => {}
        }
    }

    /// Reset all observability state
    pub fn reset(&self) {
        self.metrics.reset();
    }
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Collector {
    fn clone(&self) -> Self {
        Self {
            stream: self.stream.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Convenience emitters for common events
impl Collector {
    /// Record primitive creation
    pub fn primitive_created(&self, id: PrimitiveId, kind: &str) {
        self.emit(
            Event::new(
                Severity::Debug,
                Self::category_for(kind),
                Payload::PrimitiveCreated { kind: kind.into() },
            )
            .with_primitive(id),
        );
    }

    /// Record primitive destruction and how many waiters it failed
    pub fn primitive_destroyed(&self, id: PrimitiveId, kind: &str, failed_waiters: usize) {
        let severity = if failed_waiters > 0 {
            Severity::Warn
        } else {
            Severity::Info
        };
        self.emit(
            Event::new(
                severity,
                Self::category_for(kind),
                Payload::PrimitiveDestroyed {
                    kind: kind.into(),
                    failed_waiters,
                },
            )
            .with_primitive(id),
        );
    }

    /// Record an acquire/wait deadline expiry
    pub fn acquire_timeout(&self, id: PrimitiveId, kind: &str, waited: Duration) {
        self.emit(
            Event::new(
                Severity::Warn,
                Self::category_for(kind),
                Payload::AcquireTimeout {
                    kind: kind.into(),
                    waited_ms: waited.as_millis() as u64,
                },
            )
            .with_primitive(id),
        );
    }

    /// Record a rejected pool submission
    pub fn task_rejected(&self, id: PrimitiveId, queued: usize, capacity: usize) {
        self.emit(
            Event::new(
                Severity::Warn,
                Category::Pool,
                Payload::TaskRejected { queued, capacity },
            )
            .with_primitive(id),
        );
    }

    /// Record a panicking task
    pub fn task_panicked(&self, id: PrimitiveId, task_id: TaskId) {
        self.emit(
            Event::new(
                Severity::Error,
                Category::Pool,
                Payload::TaskPanicked { task_id },
            )
            .with_primitive(id),
        );
    }

    /// Record a race-condition violation
    pub fn race_detected(
        &self,
        id: PrimitiveId,
        resource: &str,
        operations: Vec<String>,
        max_concurrent: usize,
    ) {
        self.emit(
            Event::new(
                Severity::Warn,
                Category::Race,
                Payload::RaceDetected {
                    resource: resource.into(),
                    operations,
                    max_concurrent,
                },
            )
            .with_primitive(id),
        );
    }

    fn category_for(kind: &str) -> Category {
        match kind {
            "semaphore" => Category::Semaphore,
            "barrier" => Category::Barrier,
            "latch" => Category::Latch,
            "pool" => Category::Pool,
            "race_detector" => Category::Race,
            _ => Category::Registry,
        }
    }
}
