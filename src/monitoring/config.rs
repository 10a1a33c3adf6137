/*!
 * Diagnostics Configuration
 * Every knob has a default and is independently overridable; the whole
 * surface round-trips through JSON for export/import
 */

use super::health::HealthThresholds;
use super::recovery::RecoveryConfig;
use crate::core::errors::DiagnosticsError;
use crate::core::limits;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Interval between background check cycles
    pub check_interval: Duration,
    /// Samples kept per rolling-statistics series
    pub rolling_window: usize,
    /// Samples required before anomaly detection engages
    pub anomaly_min_samples: usize,
    /// Z-score threshold for anomaly flagging
    pub anomaly_sigma: f64,
    /// Occurrences of an alert type required before it surfaces
    pub alert_threshold: u32,
    /// Window in which occurrences count toward the alert threshold
    pub alert_window: Duration,
    pub thresholds: HealthThresholds,
    pub recovery: RecoveryConfig,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            check_interval: limits::DEFAULT_CHECK_INTERVAL,
            rolling_window: limits::DEFAULT_ROLLING_WINDOW,
            anomaly_min_samples: limits::DEFAULT_ANOMALY_MIN_SAMPLES,
            anomaly_sigma: limits::DEFAULT_ANOMALY_SIGMA,
            alert_threshold: limits::DEFAULT_ALERT_THRESHOLD,
            alert_window: limits::DEFAULT_ALERT_WINDOW,
            thresholds: HealthThresholds::default(),
            recovery: RecoveryConfig::default(),
        }
    }
}

impl DiagnosticsConfig {
    pub fn validate(&self) -> Result<(), DiagnosticsError> {
        if self.check_interval.is_zero() {
            return Err(DiagnosticsError::InvalidConfig(
                "check_interval must be non-zero".into(),
            ));
        }
        if self.rolling_window == 0 {
            return Err(DiagnosticsError::InvalidConfig(
                "rolling_window must be non-zero".into(),
            ));
        }
        if self.anomaly_sigma <= 0.0 {
            return Err(DiagnosticsError::InvalidConfig(
                "anomaly_sigma must be positive".into(),
            ));
        }
        if self.recovery.enabled && self.recovery.max_attempts == 0 {
            return Err(DiagnosticsError::InvalidConfig(
                "recovery.max_attempts must be non-zero while recovery is enabled".into(),
            ));
        }
        Ok(())
    }

    /// Export as pretty JSON
    pub fn to_json(&self) -> Result<String, DiagnosticsError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DiagnosticsError::InvalidConfig(e.to_string()))
    }

    /// Import from JSON, validating the result
    pub fn from_json(json: &str) -> Result<Self, DiagnosticsError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DiagnosticsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
