/*!
 * Health Analysis
 * Threshold checks over component stats, with warning-to-critical
 * escalation by breach magnitude
 */

use super::anomaly::Anomaly;
use super::metrics::MetricsSnapshot;
use crate::core::limits;
use crate::core::types::{PrimitiveId, PrimitiveKind};
use crate::sync::ComponentStats;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Overall health classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    /// At most two outstanding issues
    Degraded,
    /// More than two outstanding issues
    Error,
    /// At least one critical sub-check
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Error => "error",
            HealthStatus::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Issue severity inside a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Warning,
    Critical,
}

/// One failing sub-check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthIssue {
    /// Component label, e.g. "semaphore 3" or "metrics"
    pub component: String,
    pub message: String,
    pub severity: IssueSeverity,
    /// Breached metric, when the issue came from a threshold check
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
}

impl HealthIssue {
    /// Issue carried over from a failed cycle step (collection error,
    /// recovery failure); no threshold data attached.
    pub fn carried(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            message: message.into(),
            severity: IssueSeverity::Warning,
            metric: None,
            value: None,
            limit: None,
        }
    }
}

/// Per-component sub-check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub id: PrimitiveId,
    pub kind: PrimitiveKind,
    pub status: HealthStatus,
}

/// Point-in-time health report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub timestamp_ms: u64,
    pub status: HealthStatus,
    pub issues: Vec<HealthIssue>,
    pub components: Vec<ComponentHealth>,
}

impl HealthSnapshot {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Raw-metric limits checked every cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    /// Parked waiters tolerated per primitive
    pub max_waiters: usize,
    /// Pool queue utilization (queued / capacity) tolerated
    pub max_queue_utilization: f64,
    /// Timeouts per acquire tolerated on blocking primitives
    pub max_timeout_rate: f64,
    /// Rejected-or-panicked share of pool submissions tolerated
    pub max_failure_rate: f64,
    /// Race violations tolerated per detector
    pub max_violations: usize,
    /// Mean wait tolerated (from the wait-time histograms), in milliseconds
    pub max_wait_ms: f64,
    /// Breach at or past limit * this multiplier escalates to critical
    pub critical_multiplier: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            max_waiters: 16,
            max_queue_utilization: 0.8,
            max_timeout_rate: 0.1,
            max_failure_rate: 0.2,
            max_violations: 4,
            max_wait_ms: 500.0,
            critical_multiplier: limits::CRITICAL_BREACH_MULTIPLIER,
        }
    }
}

/// Stateless analyzer: component stats + metrics + anomalies in,
/// snapshot out
pub struct HealthAnalyzer {
    thresholds: HealthThresholds,
}

impl HealthAnalyzer {
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self { thresholds }
    }

    pub fn analyze(
        &self,
        components: &[(PrimitiveId, ComponentStats)],
        metrics: &MetricsSnapshot,
        anomalies: &[Anomaly],
        carried: Vec<HealthIssue>,
    ) -> HealthSnapshot {
        let mut issues = carried;
        let mut component_health = Vec::with_capacity(components.len());

        for (id, stats) in components {
            let before = issues.len();
            let kind = self.check_component(*id, stats, &mut issues);
            let status = Self::component_status(&issues[before..]);
            component_health.push(ComponentHealth {
                id: *id,
                kind,
                status,
            });
        }

        self.check_wait_times(metrics, &mut issues);

        for anomaly in anomalies {
            issues.push(HealthIssue {
                component: "metrics".into(),
                message: format!(
                    "{} deviates from rolling mean ({:.2} vs {:.2}, z={:.2})",
                    anomaly.metric, anomaly.value, anomaly.expected, anomaly.deviation
                ),
                severity: IssueSeverity::Warning,
                metric: Some(anomaly.metric.clone()),
                value: Some(anomaly.value),
                limit: None,
            });
        }

        HealthSnapshot {
            timestamp_ms: now_ms(),
            status: Self::overall_status(&issues),
            issues,
            components: component_health,
        }
    }

    fn check_component(
        &self,
        id: PrimitiveId,
        stats: &ComponentStats,
        issues: &mut Vec<HealthIssue>,
    ) -> PrimitiveKind {
        let t = &self.thresholds;
        match stats {
            ComponentStats::Semaphore(s) => {
                let label = format!("semaphore {}", id);
                self.check_limit(issues, &label, "waiters", s.waiting as f64, t.max_waiters as f64);
                self.check_timeout_rate(issues, &label, s.timeouts, s.acquires);
                PrimitiveKind::Semaphore
            }
            ComponentStats::Barrier(s) => {
                let label = format!("barrier {}", id);
                self.check_limit(issues, &label, "waiters", s.waiting as f64, t.max_waiters as f64);
                self.check_timeout_rate(issues, &label, s.timeouts, s.completions * s.parties as u64);
                PrimitiveKind::Barrier
            }
            ComponentStats::Latch(s) => {
                let label = format!("latch {}", id);
                self.check_limit(issues, &label, "waiters", s.waiting as f64, t.max_waiters as f64);
                PrimitiveKind::Latch
            }
            ComponentStats::Pool(s) => {
                let label = format!("pool {}", id);
                if s.queue_capacity > 0 {
                    let utilization = s.queued as f64 / s.queue_capacity as f64;
                    self.check_limit(
                        issues,
                        &label,
                        "queue_utilization",
                        utilization,
                        t.max_queue_utilization,
                    );
                }
                let total = s.completed + s.rejected + s.panicked;
                if total > 0 {
                    let failure_rate = (s.rejected + s.panicked) as f64 / total as f64;
                    self.check_limit(
                        issues,
                        &label,
                        "failure_rate",
                        failure_rate,
                        t.max_failure_rate,
                    );
                }
                PrimitiveKind::Pool
            }
            ComponentStats::RaceDetector(s) => {
                let label = format!("race_detector {}", id);
                self.check_limit(
                    issues,
                    &label,
                    "violations",
                    s.violations as f64,
                    t.max_violations as f64,
                );
                PrimitiveKind::RaceDetector
            }
        }
    }

    fn check_wait_times(&self, metrics: &MetricsSnapshot, issues: &mut Vec<HealthIssue>) {
        for (name, hist) in &metrics.histograms {
            if !name.ends_with(".wait_seconds") || hist.count == 0 {
                continue;
            }
            let avg_ms = hist.avg * 1000.0;
            self.check_limit(issues, "metrics", name, avg_ms, self.thresholds.max_wait_ms);
        }
    }

    /// Record an issue when value exceeds limit; escalate to critical at
    /// critical_multiplier times the limit.
    fn check_limit(
        &self,
        issues: &mut Vec<HealthIssue>,
        component: &str,
        metric: &str,
        value: f64,
        limit: f64,
    ) {
        if value <= limit {
            return;
        }
        let severity = if value >= limit * self.thresholds.critical_multiplier {
            IssueSeverity::Critical
        } else {
            IssueSeverity::Warning
        };
        issues.push(HealthIssue {
            component: component.to_string(),
            message: format!("{} at {:.2} exceeds limit {:.2}", metric, value, limit),
            severity,
            metric: Some(metric.to_string()),
            value: Some(value),
            limit: Some(limit),
        });
    }

    fn check_timeout_rate(
        &self,
        issues: &mut Vec<HealthIssue>,
        component: &str,
        timeouts: u64,
        successes: u64,
    ) {
        let total = timeouts + successes;
        if total == 0 {
            return;
        }
        let rate = timeouts as f64 / total as f64;
        self.check_limit(
            issues,
            component,
            "timeout_rate",
            rate,
            self.thresholds.max_timeout_rate,
        );
    }

    fn component_status(issues: &[HealthIssue]) -> HealthStatus {
        if issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Critical)
        {
            HealthStatus::Critical
        } else if issues.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        }
    }

    /// Terminal outcome per cycle: critical beats count-based escalation
    fn overall_status(issues: &[HealthIssue]) -> HealthStatus {
        if issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Critical)
        {
            HealthStatus::Critical
        } else {
            match issues.len() {
                0 => HealthStatus::Healthy,
                1..=2 => HealthStatus::Degraded,
                _ => HealthStatus::Error,
            }
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
