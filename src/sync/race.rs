/*!
 * Race Condition Detector
 * Per-resource sliding-window tracking of concurrent operations
 *
 * Advisory instrumentation only: it never blocks or fences the operations
 * it observes. Its job is to surface contention patterns to diagnostics.
 */

use crate::core::limits;
use crate::core::types::PrimitiveId;
use crate::monitoring::Collector;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceConfig {
    /// Sliding window within which started operations count as concurrent
    pub window: Duration,
    /// Maximum concurrent operations per resource before a violation
    pub max_concurrent: usize,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            window: limits::DEFAULT_RACE_WINDOW,
            max_concurrent: limits::DEFAULT_MAX_CONCURRENT,
        }
    }
}

/// A recorded concurrency violation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub resource: String,
    /// Every operation counted as concurrent when the violation fired
    pub operations: Vec<String>,
    pub detected_at_ms: u64,
}

#[derive(Debug, Clone)]
struct OpRecord {
    op_id: String,
    started_at: Instant,
    ended_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct DetectorState {
    by_resource: HashMap<String, Vec<OpRecord>>,
    /// operation id -> resource, for complete() lookups
    index: HashMap<String, String>,
}

/// Sliding-window race detector
pub struct RaceDetector {
    id: PrimitiveId,
    config: RaceConfig,
    state: Mutex<DetectorState>,
    violations: Mutex<Vec<Violation>>,
    races_detected: AtomicU64,
    destroyed: AtomicBool,
    collector: Collector,
}

impl RaceDetector {
    pub fn new(id: PrimitiveId, config: RaceConfig, collector: Collector) -> Arc<Self> {
        let detector = Arc::new(Self {
            id,
            config,
            state: Mutex::new(DetectorState::default()),
            violations: Mutex::new(Vec::new()),
            races_detected: AtomicU64::new(0),
            destroyed: AtomicBool::new(false),
            collector: collector.clone(),
        });
        collector.primitive_created(id, "race_detector");
        detector
    }

    pub fn id(&self) -> PrimitiveId {
        self.id
    }

    /// Record an operation start and immediately evaluate the window.
    /// Returns the violation if this start pushed the resource over its
    /// concurrency limit.
    pub fn track(&self, resource: &str, operation_id: &str) -> Option<Violation> {
        if self.destroyed.load(Ordering::Relaxed) {
            return None;
        }

        let offenders = {
            let mut state = self.state.lock();
            let records = state.by_resource.entry(resource.to_string()).or_default();
            Self::prune(records, self.config.window);
            records.push(OpRecord {
                op_id: operation_id.to_string(),
                started_at: Instant::now(),
                ended_at: None,
            });
            state
                .index
                .insert(operation_id.to_string(), resource.to_string());

            let records = &state.by_resource[resource];
            let active: Vec<String> = records
                .iter()
                .filter(|r| r.ended_at.is_none() || r.started_at.elapsed() <= self.config.window)
                .map(|r| r.op_id.clone())
                .collect();

            if active.len() > self.config.max_concurrent {
                Some(active)
            } else {
                None
            }
        };

        let operations = offenders?;
        let violation = Violation {
            resource: resource.to_string(),
            operations: operations.clone(),
            detected_at_ms: now_ms(),
        };

        {
            let mut log = self.violations.lock();
            if log.len() >= limits::VIOLATION_LOG_CAP {
                log.remove(0);
            }
            log.push(violation.clone());
        }
        self.races_detected.fetch_add(1, Ordering::Relaxed);
        self.collector
            .race_detected(self.id, resource, operations, self.config.max_concurrent);
        tracing::warn!(
            detector = %self.id,
            resource,
            concurrent = violation.operations.len(),
            limit = self.config.max_concurrent,
            "concurrent operation limit exceeded"
        );

        Some(violation)
    }

    /// Stamp an operation's end time.
    pub fn complete(&self, operation_id: &str) {
        let mut state = self.state.lock();
        let Some(resource) = state.index.remove(operation_id) else {
            return;
        };
        if let Some(records) = state.by_resource.get_mut(&resource) {
            if let Some(record) = records
                .iter_mut()
                .rev()
                .find(|r| r.op_id == operation_id && r.ended_at.is_none())
            {
                record.ended_at = Some(Instant::now());
            }
        }
    }

    /// Append-only violation log (bounded)
    pub fn violations(&self) -> Vec<Violation> {
        self.violations.lock().clone()
    }

    /// Recovery action: drop completed records and stale resources.
    pub fn clear_completed(&self) {
        let mut state = self.state.lock();
        for records in state.by_resource.values_mut() {
            records.retain(|r| r.ended_at.is_none());
        }
        state.by_resource.retain(|_, records| !records.is_empty());
    }

    /// Recovery action: forget recorded violations.
    pub fn clear_violations(&self) {
        self.violations.lock().clear();
    }

    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::Relaxed) {
            return;
        }
        let mut state = self.state.lock();
        state.by_resource.clear();
        state.index.clear();
        drop(state);
        self.collector.primitive_destroyed(self.id, "race_detector", 0);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Relaxed)
    }

    /// Point-in-time statistics
    pub fn stats(&self) -> RaceStats {
        let state = self.state.lock();
        let active_operations = state
            .by_resource
            .values()
            .flat_map(|records| records.iter())
            .filter(|r| r.ended_at.is_none())
            .count();
        RaceStats {
            tracked_resources: state.by_resource.len(),
            active_operations,
            violations: self.violations.lock().len(),
            races_detected: self.races_detected.load(Ordering::Relaxed),
            destroyed: self.destroyed.load(Ordering::Relaxed),
        }
    }

    /// Drop completed records whose start fell out of the window; hard cap
    /// keeps a hot resource from growing without bound.
    fn prune(records: &mut Vec<OpRecord>, window: Duration) {
        records.retain(|r| r.ended_at.is_none() || r.started_at.elapsed() <= window);
        if records.len() > limits::RACE_RECORDS_PER_RESOURCE {
            let excess = records.len() - limits::RACE_RECORDS_PER_RESOURCE;
            records.drain(..excess);
        }
    }
}

/// Snapshot of detector state for diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceStats {
    pub tracked_resources: usize,
    pub active_operations: usize,
    pub violations: usize,
    pub races_detected: u64,
    pub destroyed: bool,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
