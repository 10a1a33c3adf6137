/*!
 * Recovery Engine
 * Bounded, feedback-controlled auto-recovery
 *
 * For each failing component the engine applies a targeted action, then
 * re-checks health; it repeats with a growing delay up to max_attempts
 * and gives up with RecoveryFailed rather than retrying forever.
 */

use super::collector::Collector;
use super::events::{Category, Event, Payload, Severity};
use super::health::HealthSnapshot;
use crate::core::errors::DiagnosticsError;
use crate::core::limits;
use crate::sync::{PrimitiveHandle, SyncRegistry};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Recovery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Master switch; when false the controller only alerts
    pub enabled: bool,
    /// Bounded attempts per unhealthy cycle
    pub max_attempts: u32,
    /// Attempt N sleeps delay * N before re-checking
    pub delay: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: limits::DEFAULT_RECOVERY_ATTEMPTS,
            delay: limits::DEFAULT_RECOVERY_DELAY,
        }
    }
}

/// What a recovery run did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryReport {
    pub attempts: u32,
    pub recovered: bool,
    pub actions: Vec<String>,
}

/// Applies targeted recovery actions against a registry
pub struct RecoveryEngine {
    collector: Collector,
    in_progress: AtomicBool,
}

impl RecoveryEngine {
    pub fn new(collector: Collector) -> Self {
        Self {
            collector,
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Relaxed)
    }

    /// Run bounded recovery against the failing components in `snapshot`,
    /// re-checking health through `recheck` after every attempt.
    pub fn recover(
        &self,
        config: &RecoveryConfig,
        registry: &SyncRegistry,
        snapshot: &HealthSnapshot,
        recheck: impl Fn() -> HealthSnapshot,
    ) -> Result<RecoveryReport, DiagnosticsError> {
        if !config.enabled {
            return Ok(RecoveryReport {
                attempts: 0,
                recovered: false,
                actions: Vec::new(),
            });
        }

        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DiagnosticsError::AlreadyRunning("recovery".into()));
        }
        // Reset the guard however we leave this function
        let _guard = InProgressGuard(&self.in_progress);

        let mut current = snapshot.clone();
        let mut actions = Vec::new();

        for attempt in 1..=config.max_attempts {
            self.collector.emit(Event::new(
                Severity::Info,
                Category::Recovery,
                Payload::RecoveryStarted {
                    component: "coordination".into(),
                    attempt,
                },
            ));
            tracing::info!(attempt, status = %current.status, "recovery attempt");

            actions.extend(self.apply_actions(registry, &current));
            std::thread::sleep(config.delay.saturating_mul(attempt));

            current = recheck();
            if current.is_healthy() {
                self.collector.emit(Event::new(
                    Severity::Info,
                    Category::Recovery,
                    Payload::RecoverySucceeded {
                        component: "coordination".into(),
                        attempts: attempt,
                    },
                ));
                tracing::info!(attempts = attempt, "recovery succeeded");
                return Ok(RecoveryReport {
                    attempts: attempt,
                    recovered: true,
                    actions,
                });
            }
        }

        self.collector.emit(Event::new(
            Severity::Error,
            Category::Recovery,
            Payload::RecoveryFailed {
                component: "coordination".into(),
                attempts: config.max_attempts,
            },
        ));
        tracing::error!(
            attempts = config.max_attempts,
            "recovery exhausted all attempts"
        );
        Err(DiagnosticsError::RecoveryFailed {
            attempts: config.max_attempts,
        })
    }

    /// One pass of targeted actions over the failing components.
    fn apply_actions(&self, registry: &SyncRegistry, snapshot: &HealthSnapshot) -> Vec<String> {
        let mut actions = Vec::new();

        for component in &snapshot.components {
            if component.status == super::health::HealthStatus::Healthy {
                continue;
            }
            let Some(handle) = registry.get(component.id) else {
                continue;
            };
            match handle {
                PrimitiveHandle::Semaphore(sem) => {
                    let released = sem.force_release();
                    actions.push(format!(
                        "semaphore {}: restored permits, released {} waiters",
                        component.id, released
                    ));
                }
                PrimitiveHandle::Pool(pool) => {
                    let dropped = pool.drain_queue();
                    actions.push(format!(
                        "pool {}: drained {} queued tasks",
                        component.id, dropped
                    ));
                }
                PrimitiveHandle::RaceDetector(detector) => {
                    detector.clear_completed();
                    detector.clear_violations();
                    actions.push(format!(
                        "race_detector {}: cleared history",
                        component.id
                    ));
                }
                PrimitiveHandle::Barrier(barrier) => {
                    barrier.reset();
                    actions.push(format!("barrier {}: reset stuck rendezvous", component.id));
                }
                // No safe targeted action: opening the gate early would lie
                // to its waiters
                PrimitiveHandle::Latch(_) => {}
            }
        }

        if snapshot.issues.iter().any(|i| i.component == "metrics") {
            registry.collector().reset();
            actions.push("metrics: counters reset".into());
        }

        let swept = registry.sweep_destroyed();
        if swept > 0 {
            actions.push(format!("registry: collected {} destroyed primitives", swept));
        }

        actions
    }
}

struct InProgressGuard<'a>(&'a AtomicBool);

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
