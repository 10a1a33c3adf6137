/*!
 * Metrics Aggregation
 * Lightweight counters, gauges, and wait-time histograms
 *
 * Every primitive operation reports its outcome and timing here; the
 * diagnostics controller reads snapshots on each check cycle.
 */

use ahash::RandomState;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Histogram bucket boundaries in seconds, tuned for lock wait times:
/// sub-millisecond fast paths up to multi-second stalls.
const WAIT_BUCKETS: [f64; 9] = [0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 1.0, 10.0];

/// Histogram data structure
#[derive(Debug, Clone)]
struct Histogram {
    buckets: Vec<f64>,
    counts: Vec<u64>,
    sum: f64,
    count: u64,
}

impl Histogram {
    fn new() -> Self {
        Self {
            buckets: WAIT_BUCKETS.to_vec(),
            counts: vec![0; WAIT_BUCKETS.len()],
            sum: 0.0,
            count: 0,
        }
    }

    fn observe(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;

        for (i, &bucket) in self.buckets.iter().enumerate() {
            if value <= bucket {
                self.counts[i] += 1;
            }
        }
    }

    fn percentile(&self, p: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }

        let target = (self.count as f64 * p) as u64;
        for (i, &count) in self.counts.iter().enumerate() {
            if count >= target {
                return self.buckets[i];
            }
        }
        self.buckets.last().copied().unwrap_or(0.0)
    }
}

/// Metrics aggregator shared by every primitive a registry creates
pub struct MetricsAggregator {
    counters: Arc<DashMap<String, f64, RandomState>>,
    gauges: Arc<DashMap<String, f64, RandomState>>,
    histograms: Arc<DashMap<String, Histogram, RandomState>>,
    start_time: Instant,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(DashMap::with_hasher(RandomState::new())),
            gauges: Arc::new(DashMap::with_hasher(RandomState::new())),
            histograms: Arc::new(DashMap::with_hasher(RandomState::new())),
            start_time: Instant::now(),
        }
    }

    /// Increment a counter
    pub fn inc_counter(&self, name: &str, value: f64) {
        self.counters
            .entry(name.to_string())
            .and_modify(|v| *v += value)
            .or_insert(value);
    }

    /// Set a gauge value
    pub fn set_gauge(&self, name: &str, value: f64) {
        self.gauges.insert(name.to_string(), value);
    }

    /// Raise a gauge to a new peak, keeping the old value if higher.
    /// Used for concurrency peaks (max waiters, max queue depth).
    pub fn set_gauge_max(&self, name: &str, value: f64) {
        self.gauges
            .entry(name.to_string())
            .and_modify(|v| {
                if value > *v {
                    *v = value;
                }
            })
            .or_insert(value);
    }

    /// Observe a value in a histogram
    pub fn observe_histogram(&self, name: &str, value: f64) {
        self.histograms
            .entry(name.to_string())
            .and_modify(|hist| hist.observe(value))
            .or_insert_with(|| {
                let mut hist = Histogram::new();
                hist.observe(value);
                hist
            });
    }

    /// Record a wait duration for a primitive kind
    pub fn record_wait(&self, kind: &str, wait: Duration) {
        self.observe_histogram(&format!("{}.wait_seconds", kind), wait.as_secs_f64());
    }

    /// Record an operation outcome and duration
    pub fn record_operation(&self, kind: &str, duration: Duration, success: bool) {
        self.observe_histogram(
            &format!("{}.op_seconds", kind),
            duration.as_secs_f64(),
        );
        self.inc_counter(&format!("{}.ops", kind), 1.0);
        if !success {
            self.inc_counter(&format!("{}.errors", kind), 1.0);
        }
    }

    /// Read a counter (0.0 when absent)
    pub fn counter(&self, name: &str) -> f64 {
        self.counters.get(name).map(|v| *v).unwrap_or(0.0)
    }

    /// Read a gauge (0.0 when absent)
    pub fn gauge(&self, name: &str) -> f64 {
        self.gauges.get(name).map(|v| *v).unwrap_or(0.0)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters: HashMap<String, f64> = self
            .counters
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();

        let gauges: HashMap<String, f64> = self
            .gauges
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();

        let histograms: HashMap<String, HistogramStats> = self
            .histograms
            .iter()
            .map(|entry| {
                let hist = entry.value();
                let stats = HistogramStats {
                    count: hist.count,
                    sum: hist.sum,
                    avg: if hist.count > 0 {
                        hist.sum / hist.count as f64
                    } else {
                        0.0
                    },
                    p50: hist.percentile(0.50),
                    p95: hist.percentile(0.95),
                    p99: hist.percentile(0.99),
                };
                (entry.key().clone(), stats)
            })
            .collect();

        MetricsSnapshot {
            counters,
            gauges,
            histograms,
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// Reset all metrics (used by recovery actions)
    pub fn reset(&self) {
        self.counters.clear();
        self.gauges.clear();
        self.histograms.clear();
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Histogram statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HistogramStats {
    pub count: u64,
    pub sum: f64,
    pub avg: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Snapshot of all metrics at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MetricsSnapshot {
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub counters: HashMap<String, f64>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub gauges: HashMap<String, f64>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub histograms: HashMap<String, HistogramStats>,
    pub uptime_secs: u64,
}
