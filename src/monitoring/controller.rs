/*!
 * Diagnostics Controller
 * Periodic health-check loop: Collect -> Analyze -> Alert -> Recover
 *
 * The loop runs on its own named thread at check_interval, promptly
 * interruptible by stop(). Cycle failures are caught, logged, and folded
 * into the next snapshot as issues; they never kill the loop.
 */

use super::alerts::{Alert, AlertManager};
use super::anomaly::{Anomaly, AnomalyDetector};
use super::collector::Collector;
use super::config::DiagnosticsConfig;
use super::events::{Category, Event, Payload, Severity};
use super::health::{HealthAnalyzer, HealthIssue, HealthSnapshot, IssueSeverity};
use super::recovery::RecoveryEngine;
use crate::core::errors::DiagnosticsError;
use crate::sync::{ComponentStats, SyncRegistry};
use arc_swap::ArcSwap;
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

/// Self-healing diagnostics controller
pub struct DiagnosticsController {
    registry: Arc<SyncRegistry>,
    collector: Collector,
    /// Handle back to our own Arc so start() can hand the loop a clone
    self_ref: Weak<DiagnosticsController>,
    config: ArcSwap<DiagnosticsConfig>,
    detector: Mutex<AnomalyDetector>,
    alerts: AlertManager,
    recovery: RecoveryEngine,
    /// Issues carried into the next snapshot (failed cycle steps)
    pending: Mutex<Vec<HealthIssue>>,
    last: Mutex<Option<HealthSnapshot>>,
    running: AtomicBool,
    shutdown: Arc<(Mutex<bool>, Condvar)>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DiagnosticsController {
    pub fn new(
        registry: Arc<SyncRegistry>,
        config: DiagnosticsConfig,
    ) -> Result<Arc<Self>, DiagnosticsError> {
        config.validate()?;
        let collector = registry.collector().clone();
        Ok(Arc::new_cyclic(|weak| Self {
            registry,
            collector: collector.clone(),
            self_ref: weak.clone(),
            detector: Mutex::new(AnomalyDetector::new(
                config.rolling_window,
                config.anomaly_sigma,
                config.anomaly_min_samples,
            )),
            alerts: AlertManager::new(config.alert_threshold, config.alert_window),
            recovery: RecoveryEngine::new(collector),
            config: ArcSwap::from_pointee(config),
            pending: Mutex::new(Vec::new()),
            last: Mutex::new(None),
            running: AtomicBool::new(false),
            shutdown: Arc::new((Mutex::new(false), Condvar::new())),
            handle: Mutex::new(None),
        }))
    }

    /// Start the background check loop.
    pub fn start(&self) -> Result<(), DiagnosticsError> {
        let Some(ctrl) = self.self_ref.upgrade() else {
            return Err(DiagnosticsError::CollectionFailed(
                "controller already dropped".into(),
            ));
        };
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(DiagnosticsError::AlreadyRunning(
                "diagnostics controller".into(),
            ));
        }
        *self.shutdown.0.lock() = false;
        let spawned = std::thread::Builder::new()
            .name("concord-diagnostics".into())
            .spawn(move || ctrl.run_loop());

        match spawned {
            Ok(handle) => {
                *self.handle.lock() = Some(handle);
                tracing::info!("diagnostics controller started");
                Ok(())
            }
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                Err(DiagnosticsError::CollectionFailed(format!(
                    "failed to spawn check loop: {}",
                    err
                )))
            }
        }
    }

    /// Stop the loop and join its thread. Safe to call when not running.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        {
            let (lock, cv) = &*self.shutdown;
            *lock.lock() = true;
            cv.notify_all();
        }
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
        tracing::info!("diagnostics controller stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run one synchronous check cycle and return its snapshot.
    pub fn check_now(&self) -> HealthSnapshot {
        self.run_cycle()
    }

    /// Most recent snapshot, if any cycle has run
    pub fn last_snapshot(&self) -> Option<HealthSnapshot> {
        self.last.lock().clone()
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        self.alerts.active()
    }

    pub fn alert_history(&self) -> Vec<Alert> {
        self.alerts.history()
    }

    /// Mark alerts of a type resolved and emit the matching event.
    pub fn resolve_alert(&self, alert_type: &str) -> usize {
        let touched = self.alerts.resolve(alert_type);
        if touched > 0 {
            self.collector.emit(Event::new(
                Severity::Info,
                Category::Health,
                Payload::AlertResolved {
                    alert_type: alert_type.into(),
                },
            ));
        }
        touched
    }

    /// Current effective configuration
    pub fn config(&self) -> DiagnosticsConfig {
        (**self.config.load()).clone()
    }

    /// Swap in a new configuration; anomaly history restarts so the new
    /// window and sigma apply cleanly.
    pub fn update_config(&self, config: DiagnosticsConfig) -> Result<(), DiagnosticsError> {
        config.validate()?;
        *self.detector.lock() = AnomalyDetector::new(
            config.rolling_window,
            config.anomaly_sigma,
            config.anomaly_min_samples,
        );
        self.alerts
            .reconfigure(config.alert_threshold, config.alert_window);
        self.config.store(Arc::new(config));
        Ok(())
    }

    /// Export the effective configuration as JSON
    pub fn export_config(&self) -> Result<String, DiagnosticsError> {
        self.config.load().to_json()
    }

    /// Import a JSON configuration (validated before it takes effect)
    pub fn import_config(&self, json: &str) -> Result<(), DiagnosticsError> {
        self.update_config(DiagnosticsConfig::from_json(json)?)
    }

    fn run_loop(self: Arc<Self>) {
        loop {
            let interval = self.config.load().check_interval;
            {
                let (lock, cv) = &*self.shutdown;
                let mut stop = lock.lock();
                if *stop {
                    break;
                }
                cv.wait_for(&mut stop, interval);
                if *stop {
                    break;
                }
            }

            // A panicking cycle is folded into the next snapshot rather
            // than taking the loop down
            let cycle = catch_unwind(AssertUnwindSafe(|| self.run_cycle()));
            if cycle.is_err() {
                tracing::error!("check cycle panicked");
                self.pending
                    .lock()
                    .push(HealthIssue::carried("diagnostics", "check cycle panicked"));
            }
        }
    }

    /// One full cycle: Collect -> Analyze -> Alert -> Recover -> Re-check
    fn run_cycle(&self) -> HealthSnapshot {
        let config = self.config.load_full();

        // Collect
        let components = self.registry.component_stats();
        let metrics = self.collector.metrics_snapshot();
        self.registry.sweep_destroyed();

        // Analyze: feed the rolling series, then run threshold checks
        let anomalies = self.observe_samples(&components, &metrics);
        for anomaly in &anomalies {
            self.collector.emit(Event::new(
                Severity::Warn,
                Category::Health,
                Payload::AnomalyDetected {
                    metric: anomaly.metric.clone(),
                    value: anomaly.value,
                    expected: anomaly.expected,
                    deviation: anomaly.deviation,
                },
            ));
        }

        let carried = std::mem::take(&mut *self.pending.lock());
        let analyzer = HealthAnalyzer::new(config.thresholds.clone());
        let snapshot = analyzer.analyze(&components, &metrics, &anomalies, carried);

        for issue in &snapshot.issues {
            if let (Some(metric), Some(value), Some(limit)) =
                (&issue.metric, issue.value, issue.limit)
            {
                self.collector.emit(Event::new(
                    Severity::Warn,
                    Category::Health,
                    Payload::ThresholdBreached {
                        metric: metric.clone(),
                        value,
                        limit,
                    },
                ));
            }
        }

        self.note_transition(&snapshot);

        // Alert (de-duplicated per type)
        for issue in &snapshot.issues {
            let alert_type = match &issue.metric {
                Some(metric) => format!("{}:{}", issue.component, metric),
                None => issue.component.clone(),
            };
            let severity = match issue.severity {
                IssueSeverity::Warning => Severity::Warn,
                IssueSeverity::Critical => Severity::Critical,
            };
            let payload = serde_json::json!({
                "component": issue.component,
                "message": issue.message,
                "value": issue.value,
                "limit": issue.limit,
            });

            if let Some(alert) = self.alerts.record(&alert_type, severity, payload) {
                tracing::warn!(
                    alert_type = %alert.alert_type,
                    occurrences = alert.occurrences,
                    "alert raised"
                );
                self.collector.emit(Event::new(
                    severity,
                    Category::Health,
                    Payload::AlertRaised {
                        alert_type: alert.alert_type.clone(),
                        occurrences: alert.occurrences,
                    },
                ));
            }
        }

        // Recover, then fold failures into the next cycle
        if !snapshot.is_healthy() && config.recovery.enabled {
            let result = self.recovery.recover(
                &config.recovery,
                &self.registry,
                &snapshot,
                || self.collect_and_analyze(&config),
            );
            match result {
                Ok(report) if report.recovered => {
                    tracing::info!(attempts = report.attempts, "component recovered");
                }
                Ok(_) => {}
                Err(DiagnosticsError::AlreadyRunning(_)) => {
                    tracing::debug!("recovery already in progress, skipping");
                }
                Err(DiagnosticsError::RecoveryFailed { attempts }) => {
                    self.pending.lock().push(HealthIssue::carried(
                        "recovery",
                        format!("auto-recovery failed after {} attempts", attempts),
                    ));
                }
                Err(other) => {
                    self.pending
                        .lock()
                        .push(HealthIssue::carried("diagnostics", other.to_string()));
                }
            }
        }

        snapshot
    }

    /// Collect + analyze without alerting or sample feeding; used as the
    /// recovery re-check so retries do not pollute the rolling series.
    fn collect_and_analyze(&self, config: &DiagnosticsConfig) -> HealthSnapshot {
        let components = self.registry.component_stats();
        let metrics = self.collector.metrics_snapshot();
        let analyzer = HealthAnalyzer::new(config.thresholds.clone());
        analyzer.analyze(&components, &metrics, &[], Vec::new())
    }

    fn observe_samples(
        &self,
        components: &[(crate::core::types::PrimitiveId, ComponentStats)],
        metrics: &super::metrics::MetricsSnapshot,
    ) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();
        let detector = self.detector.lock();

        for (id, stats) in components {
            let sample = match stats {
                ComponentStats::Semaphore(s) => {
                    Some((format!("semaphore.{}.waiting", id), s.waiting as f64))
                }
                ComponentStats::Barrier(s) => {
                    Some((format!("barrier.{}.waiting", id), s.waiting as f64))
                }
                ComponentStats::Latch(s) => {
                    Some((format!("latch.{}.waiting", id), s.waiting as f64))
                }
                ComponentStats::Pool(s) => {
                    Some((format!("pool.{}.queue_depth", id), s.queued as f64))
                }
                ComponentStats::RaceDetector(_) => None,
            };
            if let Some((metric, value)) = sample {
                if let Some(anomaly) = detector.observe(&metric, value) {
                    anomalies.push(anomaly);
                }
            }
        }

        for (name, hist) in &metrics.histograms {
            if name.ends_with(".wait_seconds") && hist.count > 0 {
                if let Some(anomaly) = detector.observe(name, hist.avg * 1000.0) {
                    anomalies.push(anomaly);
                }
            }
        }

        anomalies
    }

    fn note_transition(&self, snapshot: &HealthSnapshot) {
        let mut last = self.last.lock();
        let previous = last.as_ref().map(|s| s.status);
        if previous != Some(snapshot.status) {
            tracing::info!(
                from = %previous.map(|s| s.to_string()).unwrap_or_else(|| "unknown".into()),
                to = %snapshot.status,
                issues = snapshot.issues.len(),
                "health status changed"
            );
            self.collector.emit(Event::new(
                Severity::Info,
                Category::Health,
                Payload::HealthChanged {
                    from: previous
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "unknown".into()),
                    to: snapshot.status.to_string(),
                    issues: snapshot.issues.len(),
                },
            ));
        }
        *last = Some(snapshot.clone());
    }
}

impl Drop for DiagnosticsController {
    fn drop(&mut self) {
        // The loop holds an Arc<Self>, so by the time Drop runs the thread
        // is already gone; this only covers a started-but-never-stopped
        // controller whose loop exited on its own.
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::health::HealthStatus;
    use crate::pool::PoolConfig;
    use crate::sync::RaceConfig;
    use std::time::Duration;

    fn controller(config: DiagnosticsConfig) -> (Arc<SyncRegistry>, Arc<DiagnosticsController>) {
        let registry = Arc::new(SyncRegistry::new());
        let ctrl = DiagnosticsController::new(Arc::clone(&registry), config).unwrap();
        (registry, ctrl)
    }

    #[test]
    fn test_empty_registry_is_healthy() {
        let (_registry, ctrl) = controller(DiagnosticsConfig::default());
        let snapshot = ctrl.check_now();
        assert_eq!(snapshot.status, HealthStatus::Healthy);
        assert!(ctrl.last_snapshot().is_some());
    }

    #[test]
    fn test_saturated_pool_recovers_by_drain() {
        let mut config = DiagnosticsConfig::default();
        config.recovery.delay = Duration::from_millis(1);
        let (registry, ctrl) = controller(config);

        let pool = registry.create_pool(
            PoolConfig::new(1, 1)
                .with_queue_capacity(4)
                .with_idle_timeout(Duration::from_secs(5)),
        );

        // Block the only worker, then fill the queue past 80% utilization
        let gate = Arc::new(Mutex::new(()));
        let guard = gate.lock();
        {
            let gate = Arc::clone(&gate);
            pool.execute(0, move || {
                let _ = gate.lock();
            })
            .unwrap();
        }
        std::thread::sleep(Duration::from_millis(50));
        for _ in 0..4 {
            pool.execute(1, || {}).unwrap();
        }

        let snapshot = ctrl.check_now();
        assert_ne!(snapshot.status, HealthStatus::Healthy);
        // Recovery drained the backlog and the re-check came back healthy
        assert_eq!(pool.stats().queued, 0);
        assert_eq!(
            registry.collector().metrics().counter("recovery.succeeded"),
            1.0
        );

        drop(guard);
    }

    #[test]
    fn test_alert_surfaces_after_threshold_cycles() {
        let mut config = DiagnosticsConfig::default();
        config.alert_threshold = 2;
        config.recovery.enabled = false;
        let (registry, ctrl) = controller(config);

        // Persistent warning: violation log above the limit
        let detector = registry.create_race_detector(RaceConfig {
            window: Duration::from_secs(60),
            max_concurrent: 0,
        });
        for i in 0..5 {
            detector.track("hot", &format!("op-{}", i));
        }

        ctrl.check_now();
        assert!(ctrl.active_alerts().is_empty());

        ctrl.check_now();
        let alerts = ctrl.active_alerts();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].alert_type.contains("race_detector"));

        assert!(ctrl.resolve_alert(&alerts[0].alert_type) > 0);
        assert!(ctrl.active_alerts().is_empty());
    }

    #[test]
    fn test_config_roundtrip_through_controller() {
        let (_registry, ctrl) = controller(DiagnosticsConfig::default());

        let mut config = ctrl.config();
        config.alert_threshold = 9;
        config.thresholds.max_waiters = 2;
        ctrl.update_config(config.clone()).unwrap();

        let json = ctrl.export_config().unwrap();
        let (_registry2, other) = controller(DiagnosticsConfig::default());
        other.import_config(&json).unwrap();

        assert_eq!(other.config(), config);
    }

    #[test]
    fn test_start_stop_lifecycle() {
        let mut config = DiagnosticsConfig::default();
        config.check_interval = Duration::from_millis(20);
        let (_registry, ctrl) = controller(config);

        ctrl.start().unwrap();
        assert!(ctrl.is_running());
        assert!(matches!(
            ctrl.start(),
            Err(DiagnosticsError::AlreadyRunning(_))
        ));

        std::thread::sleep(Duration::from_millis(100));
        ctrl.stop();
        assert!(!ctrl.is_running());
        // Background cycles ran and left a snapshot behind
        assert!(ctrl.last_snapshot().is_some());
    }
}
