//! Test Options
//!
//! Every field is optional so that a record can describe a partial override
//! at any scope (config file, CLI, describe, test, measure). Resolution to
//! concrete values with defaults happens in the engine.

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};

/// Measurement options, possibly partial.
///
/// Time values are milliseconds.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Serialize,
    Deserialize,
    Archive,
    RkyvSerialize,
    RkyvDeserialize,
)]
#[archive(check_bytes)]
#[serde(default, deny_unknown_fields)]
pub struct TestOptions {
    /// Maximum measurement duration, warmup excluded
    pub measure_timeout: Option<f64>,
    /// Relative margin of error at which measurement stops early
    pub target_rme: Option<f64>,
    /// Iterations run before measurement starts
    pub warmup_iteration_count: Option<u64>,
    /// Maximum iterations per batch
    pub batch_iteration_count: Option<u64>,
    /// Maximum duration of one batch
    pub batch_timeout: Option<f64>,
    /// Pause between batches
    pub batch_intermission_timeout: Option<f64>,
}

impl TestOptions {
    /// Empty record (no overrides)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the measurement timeout in milliseconds
    pub fn with_measure_timeout(mut self, ms: f64) -> Self {
        self.measure_timeout = Some(ms);
        self
    }

    /// Set the target relative margin of error
    pub fn with_target_rme(mut self, rme: f64) -> Self {
        self.target_rme = Some(rme);
        self
    }

    /// Set the number of warmup iterations
    pub fn with_warmup_iteration_count(mut self, count: u64) -> Self {
        self.warmup_iteration_count = Some(count);
        self
    }

    /// Set the per-batch iteration cap
    pub fn with_batch_iteration_count(mut self, count: u64) -> Self {
        self.batch_iteration_count = Some(count);
        self
    }

    /// Set the batch timeout in milliseconds
    pub fn with_batch_timeout(mut self, ms: f64) -> Self {
        self.batch_timeout = Some(ms);
        self
    }

    /// Set the pause between batches in milliseconds
    pub fn with_batch_intermission_timeout(mut self, ms: f64) -> Self {
        self.batch_intermission_timeout = Some(ms);
        self
    }

    /// Merge a nested scope's options over these ones.
    ///
    /// Fields set in `inner` win; unset fields fall back to `self`.
    pub fn overlay(&self, inner: &TestOptions) -> TestOptions {
        TestOptions {
            measure_timeout: inner.measure_timeout.or(self.measure_timeout),
            target_rme: inner.target_rme.or(self.target_rme),
            warmup_iteration_count: inner.warmup_iteration_count.or(self.warmup_iteration_count),
            batch_iteration_count: inner.batch_iteration_count.or(self.batch_iteration_count),
            batch_timeout: inner.batch_timeout.or(self.batch_timeout),
            batch_intermission_timeout: inner
                .batch_intermission_timeout
                .or(self.batch_intermission_timeout),
        }
    }

    /// `true` when no field is set
    pub fn is_empty(&self) -> bool {
        *self == TestOptions::default()
    }

    /// Validate user-supplied values, returning a description of the first error found.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ms) = self.measure_timeout {
            if !(ms.is_finite() && ms > 0.0) {
                return Err(format!("measure_timeout must be > 0 ms, got {ms}"));
            }
        }
        if let Some(rme) = self.target_rme {
            if !(rme > 0.0 && rme < 1.0) {
                return Err(format!("target_rme must be within (0, 1), got {rme}"));
            }
        }
        if self.warmup_iteration_count == Some(0) {
            return Err("warmup_iteration_count must be > 0".to_string());
        }
        if self.batch_iteration_count == Some(0) {
            return Err("batch_iteration_count must be > 0".to_string());
        }
        if let Some(ms) = self.batch_timeout {
            if !(ms.is_finite() && ms > 0.0) {
                return Err(format!("batch_timeout must be > 0 ms, got {ms}"));
            }
        }
        if let Some(ms) = self.batch_intermission_timeout {
            if !(ms.is_finite() && ms >= 0.0) {
                return Err(format!("batch_intermission_timeout must be >= 0 ms, got {ms}"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_inner_wins() {
        let outer = TestOptions::new()
            .with_measure_timeout(500.0)
            .with_target_rme(0.1);
        let inner = TestOptions::new().with_target_rme(0.01);

        let merged = outer.overlay(&inner);
        assert_eq!(merged.measure_timeout, Some(500.0));
        assert_eq!(merged.target_rme, Some(0.01));
        assert_eq!(merged.warmup_iteration_count, None);
    }

    #[test]
    fn test_overlay_empty_is_identity() {
        let outer = TestOptions::new().with_batch_iteration_count(10);
        assert_eq!(outer.overlay(&TestOptions::new()), outer);
        assert_eq!(TestOptions::new().overlay(&outer), outer);
    }

    #[test]
    fn test_validate_default() {
        assert!(TestOptions::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        assert!(TestOptions::new().with_target_rme(1.0).validate().is_err());
        assert!(TestOptions::new().with_target_rme(0.0).validate().is_err());
        assert!(TestOptions::new().with_measure_timeout(-1.0).validate().is_err());
        assert!(TestOptions::new().with_warmup_iteration_count(0).validate().is_err());
        assert!(
            TestOptions::new()
                .with_batch_intermission_timeout(0.0)
                .validate()
                .is_ok()
        );
    }
}
