/*!
 * Atomic Update Engine
 * Optimistic read-modify-write over externally owned cells
 *
 * The engine never stores the value: callers supply the cell through the
 * [`AtomicTarget`] accessor seam and the engine only orchestrates the
 * retry loop. Conflicts are assumed to be the exception, not the rule.
 */

use crate::core::errors::AtomicError;
use crate::core::limits;
use crate::monitoring::Collector;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Externally owned mutable cell, exposed through read/write accessors.
pub trait AtomicTarget<T>: Send + Sync {
    fn read(&self) -> T;
    fn write(&self, value: T);
}

/// Accessor pair adapter for closures over caller-owned state.
pub struct FnTarget<R, W> {
    read: R,
    write: W,
}

impl<R, W> FnTarget<R, W> {
    pub fn new(read: R, write: W) -> Self {
        Self { read, write }
    }
}

impl<T, R, W> AtomicTarget<T> for FnTarget<R, W>
where
    R: Fn() -> T + Send + Sync,
    W: Fn(T) + Send + Sync,
{
    fn read(&self) -> T {
        (self.read)()
    }

    fn write(&self, value: T) {
        (self.write)(value)
    }
}

/// Mutex-backed cell, handy for tests and simple shared state.
pub struct MutexCell<T> {
    value: Mutex<T>,
}

impl<T: Clone> MutexCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }

    pub fn get(&self) -> T {
        self.value.lock().clone()
    }
}

impl<T: Clone + Send + Sync> AtomicTarget<T> for MutexCell<T> {
    fn read(&self) -> T {
        self.value.lock().clone()
    }

    fn write(&self, value: T) {
        *self.value.lock() = value;
    }
}

/// Delay function applied between optimistic retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum BackoffPolicy {
    /// delay = step * attempt
    Linear { step: Duration },
    /// delay = base * 2^(attempt-1), capped
    Exponential { base: Duration },
    /// Full jitter: uniform in [0, exponential delay]
    ExponentialJitter { base: Duration },
}

impl BackoffPolicy {
    /// Delay before the given attempt (1-based). Capped at BACKOFF_CAP.
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let raw = match self {
            BackoffPolicy::Linear { step } => step.saturating_mul(attempt),
            BackoffPolicy::Exponential { base } | BackoffPolicy::ExponentialJitter { base } => {
                let shift = (attempt - 1).min(16);
                base.saturating_mul(1u32 << shift)
            }
        };
        let capped = raw.min(limits::BACKOFF_CAP);

        match self {
            BackoffPolicy::ExponentialJitter { .. } => {
                let nanos = capped.as_nanos() as u64;
                if nanos == 0 {
                    return capped;
                }
                Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos))
            }
            _ => capped,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Exponential {
            base: limits::DEFAULT_BACKOFF_BASE,
        }
    }
}

/// Retry configuration for optimistic updates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 = single attempt)
    pub max_retries: u32,
    pub backoff: BackoffPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: limits::DEFAULT_MAX_RETRIES,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Optimistic update engine
pub struct AtomicEngine {
    config: RetryConfig,
    collector: Collector,
}

impl AtomicEngine {
    pub fn new(config: RetryConfig, collector: Collector) -> Self {
        Self { config, collector }
    }

    /// Write `new` only while the cell still holds `expected`, retrying
    /// with backoff when a conflicting value is observed.
    pub fn compare_and_set<T>(
        &self,
        target: &impl AtomicTarget<T>,
        expected: &T,
        new: T,
    ) -> Result<(), AtomicError>
    where
        T: PartialEq + Clone,
    {
        let start = Instant::now();
        for attempt in 0..=self.config.max_retries {
            if target.read() == *expected {
                target.write(new);
                self.record(start, attempt, true);
                return Ok(());
            }

            self.collector.metrics().inc_counter("atomic.conflicts", 1.0);
            if attempt < self.config.max_retries {
                std::thread::sleep(self.config.backoff.delay(attempt + 1));
            }
        }

        self.record(start, self.config.max_retries, false);
        Err(AtomicError::RetryExhausted {
            attempts: self.config.max_retries + 1,
        })
    }

    /// Apply a pure function to the current value; the write commits only
    /// if a re-read still matches the snapshot. Returns the new value.
    pub fn fetch_update<T>(
        &self,
        target: &impl AtomicTarget<T>,
        f: impl Fn(&T) -> T,
    ) -> Result<T, AtomicError>
    where
        T: PartialEq + Clone,
    {
        let start = Instant::now();
        for attempt in 0..=self.config.max_retries {
            let snapshot = target.read();
            let new = f(&snapshot);

            if target.read() == snapshot {
                target.write(new.clone());
                self.record(start, attempt, true);
                return Ok(new);
            }

            self.collector.metrics().inc_counter("atomic.conflicts", 1.0);
            if attempt < self.config.max_retries {
                std::thread::sleep(self.config.backoff.delay(attempt + 1));
            }
        }

        self.record(start, self.config.max_retries, false);
        Err(AtomicError::RetryExhausted {
            attempts: self.config.max_retries + 1,
        })
    }

    /// Increment an integer cell
    pub fn increment(&self, target: &impl AtomicTarget<i64>) -> Result<i64, AtomicError> {
        self.fetch_update(target, |v| v + 1)
    }

    /// Decrement an integer cell
    pub fn decrement(&self, target: &impl AtomicTarget<i64>) -> Result<i64, AtomicError> {
        self.fetch_update(target, |v| v - 1)
    }

    fn record(&self, start: Instant, attempts: u32, success: bool) {
        self.collector
            .metrics()
            .record_operation("atomic", start.elapsed(), success);
        self.collector
            .metrics()
            .observe_histogram("atomic.attempts", attempts as f64 + 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn engine(max_retries: u32) -> AtomicEngine {
        AtomicEngine::new(
            RetryConfig {
                max_retries,
                backoff: BackoffPolicy::Linear {
                    step: Duration::from_millis(5),
                },
            },
            Collector::new(),
        )
    }

    #[test]
    fn test_cas_success() {
        let cell = MutexCell::new(10);
        let engine = engine(0);
        assert!(engine.compare_and_set(&cell, &10, 20).is_ok());
        assert_eq!(cell.get(), 20);
    }

    #[test]
    fn test_cas_no_retries_fails() {
        let cell = MutexCell::new(99);
        let engine = engine(0);
        let result = engine.compare_and_set(&cell, &10, 20);
        assert_eq!(result, Err(AtomicError::RetryExhausted { attempts: 1 }));
        assert_eq!(cell.get(), 99);
    }

    #[test]
    fn test_cas_wins_after_external_fix() {
        let cell = Arc::new(MutexCell::new(1));
        let engine = engine(3);

        // External mutator restores the expected value after one conflict
        let cell_clone = Arc::clone(&cell);
        let mutator = thread::spawn(move || {
            thread::sleep(Duration::from_millis(8));
            cell_clone.write(10);
        });

        let result = engine.compare_and_set(cell.as_ref(), &10, 20);
        mutator.join().unwrap();
        assert!(result.is_ok());
        assert_eq!(cell.get(), 20);
    }

    #[test]
    fn test_fetch_update() {
        let cell = MutexCell::new(5i64);
        let engine = engine(1);
        assert_eq!(engine.fetch_update(&cell, |v| v * 2).unwrap(), 10);
        assert_eq!(engine.increment(&cell).unwrap(), 11);
        assert_eq!(engine.decrement(&cell).unwrap(), 10);
    }

    #[test]
    fn test_fn_target() {
        let shared = Arc::new(Mutex::new(String::from("old")));
        let read_handle = Arc::clone(&shared);
        let write_handle = Arc::clone(&shared);
        let target = FnTarget::new(
            move || read_handle.lock().clone(),
            move |v| *write_handle.lock() = v,
        );

        let engine = engine(0);
        engine
            .compare_and_set(&target, &"old".to_string(), "new".to_string())
            .unwrap();
        assert_eq!(*shared.lock(), "new");
    }

    proptest::proptest! {
        #[test]
        fn prop_delays_never_exceed_cap(
            attempt in 1u32..64,
            base_ms in 0u64..5_000,
        ) {
            let policies = [
                BackoffPolicy::Linear { step: Duration::from_millis(base_ms) },
                BackoffPolicy::Exponential { base: Duration::from_millis(base_ms) },
                BackoffPolicy::ExponentialJitter { base: Duration::from_millis(base_ms) },
            ];
            for policy in policies {
                proptest::prop_assert!(policy.delay(attempt) <= limits::BACKOFF_CAP);
            }
        }

        #[test]
        fn prop_linear_is_monotonic(attempt in 1u32..100) {
            let policy = BackoffPolicy::Linear { step: Duration::from_micros(10) };
            proptest::prop_assert!(policy.delay(attempt) <= policy.delay(attempt + 1));
        }
    }

    #[test]
    fn test_backoff_delays() {
        let linear = BackoffPolicy::Linear {
            step: Duration::from_millis(2),
        };
        assert_eq!(linear.delay(3), Duration::from_millis(6));

        let exp = BackoffPolicy::Exponential {
            base: Duration::from_millis(1),
        };
        assert_eq!(exp.delay(1), Duration::from_millis(1));
        assert_eq!(exp.delay(4), Duration::from_millis(8));
        // Capped
        assert_eq!(exp.delay(12), limits::BACKOFF_CAP);

        let jitter = BackoffPolicy::ExponentialJitter {
            base: Duration::from_millis(4),
        };
        for attempt in 1..6 {
            assert!(jitter.delay(attempt) <= limits::BACKOFF_CAP);
        }
    }
}
