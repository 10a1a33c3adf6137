/*!
 * Diagnostics Integration Tests
 *
 * Race detection, the full check loop, bounded recovery, alert
 * de-duplication, and configuration round-trips
 */

use concord::{
    DiagnosticsConfig, DiagnosticsController, HealthStatus, PoolConfig, RaceConfig,
    SemaphoreConfig, SyncRegistry,
};
use parking_lot::Mutex;
use serial_test::serial;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn quick_config() -> DiagnosticsConfig {
    let mut config = DiagnosticsConfig::default();
    config.check_interval = Duration::from_millis(30);
    config.recovery.delay = Duration::from_millis(1);
    config
}

#[test]
fn test_race_detection_exact_violation() {
    let registry = SyncRegistry::new();
    let detector = registry.create_race_detector(RaceConfig {
        window: Duration::from_secs(1),
        max_concurrent: 2,
    });

    detector.track("document:42", "upload");
    detector.track("document:42", "validate");
    let violation = detector.track("document:42", "index").unwrap();

    // Exactly one violation, listing all three concurrent operations
    let violations = detector.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].operations.len(), 3);
    for op in ["upload", "validate", "index"] {
        assert!(violation.operations.iter().any(|o| o == op));
    }
    assert_eq!(
        registry.collector().metrics().counter("race.detected"),
        1.0
    );

    detector.complete("upload");
    detector.complete("validate");
    detector.complete("index");
    assert_eq!(detector.stats().active_operations, 0);
}

#[test]
#[serial]
fn test_semaphore_pressure_recovered_by_force_release() {
    let mut config = quick_config();
    config.thresholds.max_waiters = 1;
    let registry = Arc::new(SyncRegistry::new());
    let ctrl = DiagnosticsController::new(Arc::clone(&registry), config).unwrap();

    let sem = registry.create_semaphore(SemaphoreConfig::new(1));
    sem.acquire(None).unwrap();

    // Three parked waiters breach max_waiters at critical magnitude; each
    // releases its permit once granted, so a single force-release drains
    // the whole queue hand-to-hand
    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let sem = Arc::clone(&sem);
            thread::spawn(move || {
                let granted = sem.acquire(Some(Duration::from_secs(10)));
                if granted.is_ok() {
                    sem.release().unwrap();
                }
                granted
            })
        })
        .collect();
    thread::sleep(Duration::from_millis(100));

    let snapshot = ctrl.check_now();
    assert_eq!(snapshot.status, HealthStatus::Critical);

    // Recovery restored the permit pool and released the queue
    for waiter in waiters {
        assert!(waiter.join().unwrap().is_ok());
    }
    assert_eq!(
        registry.collector().metrics().counter("recovery.succeeded"),
        1.0
    );
    let after = ctrl.check_now();
    assert_eq!(after.status, HealthStatus::Healthy);
}

#[test]
#[serial]
fn test_recovery_bound_on_permanently_unhealthy() {
    let mut config = quick_config();
    config.recovery.max_attempts = 2;
    config.alert_threshold = 1;
    let registry = Arc::new(SyncRegistry::new());
    let ctrl = DiagnosticsController::new(Arc::clone(&registry), config).unwrap();

    // A history of timed-out acquires is permanently unhealthy: the
    // timeout rate is cumulative, and no recovery action can rewrite it
    let sem = registry.create_semaphore(SemaphoreConfig::new(1));
    sem.acquire(None).unwrap();
    for _ in 0..3 {
        let _ = sem.acquire(Some(Duration::from_millis(10)));
    }

    let mut sub = registry.collector().subscribe();
    let snapshot = ctrl.check_now();
    assert_ne!(snapshot.status, HealthStatus::Healthy);

    // Exactly max_attempts recovery starts, then a RecoveryFailed event
    let events = sub.drain();
    let starts = events
        .iter()
        .filter(|e| {
            matches!(
                e.payload,
                concord::monitoring::Payload::RecoveryStarted { .. }
            )
        })
        .count();
    let failures = events
        .iter()
        .filter(|e| {
            matches!(
                e.payload,
                concord::monitoring::Payload::RecoveryFailed { .. }
            )
        })
        .count();
    assert_eq!(starts, 2);
    assert_eq!(failures, 1);

    // The failure is folded into the next cycle as an issue
    let next = ctrl.check_now();
    assert!(next
        .issues
        .iter()
        .any(|issue| issue.component == "recovery"));
}

#[test]
#[serial]
fn test_alert_deduplication_over_cycles() {
    let mut config = quick_config();
    config.alert_threshold = 3;
    config.recovery.enabled = false;
    let registry = Arc::new(SyncRegistry::new());
    let ctrl = DiagnosticsController::new(Arc::clone(&registry), config).unwrap();

    let detector = registry.create_race_detector(RaceConfig {
        window: Duration::from_secs(60),
        max_concurrent: 0,
    });
    for i in 0..6 {
        detector.track("hot", &format!("op-{}", i));
    }

    ctrl.check_now();
    ctrl.check_now();
    assert!(ctrl.active_alerts().is_empty(), "two blips stay suppressed");

    ctrl.check_now();
    let alerts = ctrl.active_alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].occurrences, 3);
}

#[test]
#[serial]
fn test_background_loop_detects_saturation() {
    let mut config = quick_config();
    config.alert_threshold = 1;
    config.recovery.delay = Duration::from_millis(1);
    let registry = Arc::new(SyncRegistry::new());
    let ctrl = DiagnosticsController::new(Arc::clone(&registry), config).unwrap();

    let pool = registry.create_pool(
        PoolConfig::new(1, 1)
            .with_queue_capacity(4)
            .with_idle_timeout(Duration::from_secs(5)),
    );

    let gate = Arc::new(Mutex::new(()));
    let guard = gate.lock();
    {
        let gate = Arc::clone(&gate);
        pool.execute(0, move || {
            let _ = gate.lock();
        })
        .unwrap();
    }
    thread::sleep(Duration::from_millis(30));
    for _ in 0..4 {
        pool.execute(1, || {}).unwrap();
    }

    ctrl.start().unwrap();
    thread::sleep(Duration::from_millis(200));
    ctrl.stop();

    // The loop saw the saturated queue and recovery drained it
    assert_eq!(pool.stats().queued, 0);
    assert!(ctrl.last_snapshot().is_some());
    assert!(registry.collector().metrics().counter("recovery.succeeded") >= 1.0);

    drop(guard);
}

#[test]
fn test_config_export_import_roundtrip() {
    let registry = Arc::new(SyncRegistry::new());
    let ctrl = DiagnosticsController::new(Arc::clone(&registry), DiagnosticsConfig::default())
        .unwrap();

    let mut config = ctrl.config();
    config.check_interval = Duration::from_millis(250);
    config.anomaly_sigma = 3.5;
    config.alert_threshold = 5;
    config.thresholds.max_queue_utilization = 0.5;
    config.recovery.max_attempts = 7;
    ctrl.update_config(config.clone()).unwrap();

    let exported = ctrl.export_config().unwrap();

    let registry2 = Arc::new(SyncRegistry::new());
    let ctrl2 =
        DiagnosticsController::new(registry2, DiagnosticsConfig::default()).unwrap();
    ctrl2.import_config(&exported).unwrap();

    // Identical effective configuration after the round-trip
    assert_eq!(ctrl2.config(), config);
}
