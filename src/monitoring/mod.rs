/*!
 * Monitoring & Diagnostics
 * Events, metrics, anomaly detection, health analysis, alerting, and the
 * self-healing controller
 */

pub mod alerts;
pub mod anomaly;
pub mod collector;
pub mod config;
pub mod controller;
pub mod events;
pub mod health;
pub mod metrics;
pub mod recovery;
pub mod stream;
pub mod tracer;

pub use alerts::{Alert, AlertManager};
pub use anomaly::{Anomaly, AnomalyDetector, RollingStats};
pub use collector::Collector;
pub use config::DiagnosticsConfig;
pub use controller::DiagnosticsController;
pub use events::{Category, Event, EventFilter, Payload, Severity};
pub use health::{
    ComponentHealth, HealthAnalyzer, HealthIssue, HealthSnapshot, HealthStatus, HealthThresholds,
    IssueSeverity,
};
pub use metrics::{HistogramStats, MetricsAggregator, MetricsSnapshot};
pub use recovery::{RecoveryConfig, RecoveryEngine, RecoveryReport};
pub use stream::{EventStream, StreamStats, Subscriber};
pub use tracer::init_tracing;
