/*!
 * Alert Management
 * De-duplicated alerting with bounded history
 *
 * An alert type must recur alert_threshold times inside the rolling
 * window before it surfaces; a single transient blip never pages anyone.
 */

use super::events::Severity;
use crate::core::limits;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// A surfaced alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub alert_type: String,
    pub severity: Severity,
    pub payload: serde_json::Value,
    pub timestamp_ms: u64,
    pub resolved: bool,
    /// Occurrences accumulated before the alert surfaced
    pub occurrences: u32,
}

#[derive(Debug)]
struct PendingCount {
    count: u32,
    window_start: Instant,
}

/// De-duplicating alert sink
pub struct AlertManager {
    threshold: Mutex<u32>,
    window: Mutex<Duration>,
    pending: Mutex<HashMap<String, PendingCount>>,
    history: Mutex<Vec<Alert>>,
}

impl AlertManager {
    pub fn new(threshold: u32, window: Duration) -> Self {
        Self {
            threshold: Mutex::new(threshold.max(1)),
            window: Mutex::new(window),
            pending: Mutex::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Apply new de-duplication settings; rolling counts restart.
    pub fn reconfigure(&self, threshold: u32, window: Duration) {
        *self.threshold.lock() = threshold.max(1);
        *self.window.lock() = window;
        self.pending.lock().clear();
    }

    /// Record an occurrence of an alert type. Returns the alert once the
    /// type has recurred threshold times within the window; the count then
    /// restarts so a persistent condition re-alerts every threshold hits.
    pub fn record(
        &self,
        alert_type: &str,
        severity: Severity,
        payload: serde_json::Value,
    ) -> Option<Alert> {
        let threshold = *self.threshold.lock();
        let window = *self.window.lock();

        let surfaced = {
            let mut pending = self.pending.lock();
            let entry = pending
                .entry(alert_type.to_string())
                .or_insert_with(|| PendingCount {
                    count: 0,
                    window_start: Instant::now(),
                });

            if entry.window_start.elapsed() > window {
                // Window lapsed: the blips were transient
                entry.count = 0;
                entry.window_start = Instant::now();
            }

            entry.count += 1;
            if entry.count >= threshold {
                let occurrences = entry.count;
                entry.count = 0;
                entry.window_start = Instant::now();
                Some(occurrences)
            } else {
                None
            }
        };

        let occurrences = surfaced?;
        let alert = Alert {
            id: Uuid::new_v4(),
            alert_type: alert_type.to_string(),
            severity,
            payload,
            timestamp_ms: now_ms(),
            resolved: false,
            occurrences,
        };

        let mut history = self.history.lock();
        if history.len() >= limits::ALERT_HISTORY_CAP {
            history.remove(0);
        }
        history.push(alert.clone());

        Some(alert)
    }

    /// Mark every unresolved alert of the given type resolved. Returns the
    /// number of alerts touched.
    pub fn resolve(&self, alert_type: &str) -> usize {
        let mut history = self.history.lock();
        let mut touched = 0;
        for alert in history.iter_mut() {
            if alert.alert_type == alert_type && !alert.resolved {
                alert.resolved = true;
                touched += 1;
            }
        }
        touched
    }

    /// Unresolved alerts, oldest first
    pub fn active(&self) -> Vec<Alert> {
        self.history
            .lock()
            .iter()
            .filter(|a| !a.resolved)
            .cloned()
            .collect()
    }

    /// Full bounded history, oldest first
    pub fn history(&self) -> Vec<Alert> {
        self.history.lock().clone()
    }

    /// Forget all state (recovery action)
    pub fn clear(&self) {
        self.pending.lock().clear();
        self.history.lock().clear();
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(threshold: u32) -> AlertManager {
        AlertManager::new(threshold, Duration::from_secs(60))
    }

    #[test]
    fn test_suppressed_below_threshold() {
        let alerts = manager(3);
        assert!(alerts
            .record("queue_full", Severity::Warn, serde_json::json!({}))
            .is_none());
        assert!(alerts
            .record("queue_full", Severity::Warn, serde_json::json!({}))
            .is_none());
        assert!(alerts.history().is_empty());
    }

    #[test]
    fn test_surfaces_at_threshold() {
        let alerts = manager(3);
        alerts.record("queue_full", Severity::Warn, serde_json::json!({}));
        alerts.record("queue_full", Severity::Warn, serde_json::json!({}));
        let alert = alerts
            .record("queue_full", Severity::Warn, serde_json::json!({"queued": 128}))
            .unwrap();

        assert_eq!(alert.alert_type, "queue_full");
        assert_eq!(alert.occurrences, 3);
        assert!(!alert.resolved);
        assert_eq!(alerts.active().len(), 1);
    }

    #[test]
    fn test_types_count_independently() {
        let alerts = manager(2);
        alerts.record("a", Severity::Warn, serde_json::json!({}));
        assert!(alerts
            .record("b", Severity::Warn, serde_json::json!({}))
            .is_none());
        assert!(alerts
            .record("a", Severity::Warn, serde_json::json!({}))
            .is_some());
    }

    #[test]
    fn test_window_lapse_resets_count() {
        let alerts = AlertManager::new(2, Duration::from_millis(50));
        alerts.record("x", Severity::Warn, serde_json::json!({}));
        std::thread::sleep(Duration::from_millis(80));
        // First occurrence aged out; this one starts a fresh window
        assert!(alerts
            .record("x", Severity::Warn, serde_json::json!({}))
            .is_none());
    }

    #[test]
    fn test_resolve() {
        let alerts = manager(1);
        alerts.record("stuck", Severity::Error, serde_json::json!({}));
        alerts.record("stuck", Severity::Error, serde_json::json!({}));

        assert_eq!(alerts.resolve("stuck"), 2);
        assert!(alerts.active().is_empty());
        assert_eq!(alerts.history().len(), 2);
    }
}
