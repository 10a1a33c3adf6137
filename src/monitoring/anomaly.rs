/*!
 * Anomaly Detection
 * Rolling-window statistics with z-score outlier flagging
 *
 * Strategy: keep the last N samples per metric, flag a fresh sample that
 * deviates more than sigma standard deviations from the window mean.
 */

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Bounded sample window with online mean/stddev
#[derive(Debug, Clone)]
pub struct RollingStats {
    window: VecDeque<f64>,
    capacity: usize,
}

impl RollingStats {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Push a sample, evicting the oldest once the window is full
    pub fn push(&mut self, value: f64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn mean(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    /// Sample standard deviation over the window
    pub fn stddev(&self) -> f64 {
        if self.window.len() < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let var = self
            .window
            .iter()
            .map(|v| (v - mean) * (v - mean))
            .sum::<f64>()
            / (self.window.len() - 1) as f64;
        var.sqrt()
    }

    /// Z-score of a value against the current window
    pub fn z_score(&self, value: f64) -> f64 {
        let stddev = self.stddev();
        if stddev == 0.0 {
            0.0
        } else {
            (value - self.mean()).abs() / stddev
        }
    }
}

/// Detected anomaly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub metric: String,
    pub value: f64,
    pub expected: f64,
    /// Z-score of the offending sample
    pub deviation: f64,
}

/// Per-metric anomaly detector
pub struct AnomalyDetector {
    series: Mutex<HashMap<String, RollingStats>>,
    capacity: usize,
    sigma: f64,
    min_samples: usize,
}

impl AnomalyDetector {
    pub fn new(capacity: usize, sigma: f64, min_samples: usize) -> Self {
        Self {
            series: Mutex::new(HashMap::new()),
            capacity,
            sigma,
            min_samples: min_samples.max(2),
        }
    }

    /// Record a sample and flag it if it deviates from the rolling mean.
    /// The sample is judged against the window *before* it joins it.
    pub fn observe(&self, metric: &str, value: f64) -> Option<Anomaly> {
        let mut series = self.series.lock();
        let stats = series
            .entry(metric.to_string())
            .or_insert_with(|| RollingStats::new(self.capacity));

        let anomaly = if stats.len() >= self.min_samples {
            let deviation = stats.z_score(value);
            if deviation > self.sigma {
                Some(Anomaly {
                    metric: metric.to_string(),
                    value,
                    expected: stats.mean(),
                    deviation,
                })
            } else {
                None
            }
        } else {
            None
        };

        stats.push(value);
        anomaly
    }

    /// (mean, stddev, samples) for a metric
    pub fn stats(&self, metric: &str) -> Option<(f64, f64, usize)> {
        let series = self.series.lock();
        series
            .get(metric)
            .map(|s| (s.mean(), s.stddev(), s.len()))
    }

    /// Drop all history (recovery action / reconfiguration)
    pub fn reset(&self) {
        self.series.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_window_evicts() {
        let mut stats = RollingStats::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            stats.push(v);
        }
        assert_eq!(stats.len(), 3);
        assert!((stats.mean() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_stddev_known_dataset() {
        let mut stats = RollingStats::new(10);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }
        assert!((stats.mean() - 3.0).abs() < 1e-9);
        // Sample variance of 1..5 is 2.5
        assert!((stats.stddev() - 2.5f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_two_sigma_flagging() {
        let detector = AnomalyDetector::new(60, 2.0, 10);

        // Stable baseline around 100 with small spread
        for i in 0..30 {
            let value = 100.0 + (i % 5) as f64;
            assert!(detector.observe("wait_ms", value).is_none());
        }

        let anomaly = detector.observe("wait_ms", 500.0).unwrap();
        assert!(anomaly.deviation > 2.0);
        assert!((anomaly.expected - 102.0).abs() < 1.0);
    }

    #[test]
    fn test_quiet_until_min_samples() {
        let detector = AnomalyDetector::new(60, 2.0, 10);
        for _ in 0..9 {
            detector.observe("queue", 1.0);
        }
        // Still warming up: even a wild sample stays quiet
        assert!(detector.observe("queue", 1000.0).is_none());
    }

    #[test]
    fn test_independent_series() {
        let detector = AnomalyDetector::new(60, 2.0, 2);
        detector.observe("a", 1.0);
        detector.observe("b", 100.0);
        let (mean_a, _, _) = detector.stats("a").unwrap();
        let (mean_b, _, _) = detector.stats("b").unwrap();
        assert!((mean_a - 1.0).abs() < 1e-9);
        assert!((mean_b - 100.0).abs() < 1e-9);
    }
}
