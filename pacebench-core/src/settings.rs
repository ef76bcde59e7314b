//! Resolved measurement settings

use crate::error::Error;
use pacebench_ipc::TestOptions;
use std::time::Duration;

/// Default measurement timeout (ms)
pub const DEFAULT_MEASURE_TIMEOUT: f64 = 10_000.0;
/// Default target relative margin of error
pub const DEFAULT_TARGET_RME: f64 = 0.05;
/// Default warmup iteration count
pub const DEFAULT_WARMUP_ITERATION_COUNT: u64 = 1;
/// Default batch iteration cap (unbounded)
pub const DEFAULT_BATCH_ITERATION_COUNT: u64 = u64::MAX;
/// Default batch timeout (ms)
pub const DEFAULT_BATCH_TIMEOUT: f64 = 1_000.0;
/// Default pause between batches (ms)
pub const DEFAULT_BATCH_INTERMISSION_TIMEOUT: f64 = 200.0;

/// Concrete values for one measurement cycle.
///
/// Built from the merged [`TestOptions`] of the enclosing scopes; unset
/// fields take the defaults above. Values are not range-checked here, so a
/// negative `measure_timeout` simply means "stop after the first iteration".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasureSettings {
    /// Measurement timeout (ms), warmup excluded
    pub measure_timeout: f64,
    /// Stop once the relative margin of error is at or below this value
    pub target_rme: f64,
    /// Warmup iterations
    pub warmup_iteration_count: u64,
    /// Maximum iterations per batch
    pub batch_iteration_count: u64,
    /// Maximum batch duration (ms)
    pub batch_timeout: f64,
    /// Pause between batches (ms)
    pub batch_intermission_timeout: f64,
}

impl MeasureSettings {
    /// Resolve merged options against the defaults
    pub fn resolve(options: &TestOptions) -> Self {
        Self {
            measure_timeout: options.measure_timeout.unwrap_or(DEFAULT_MEASURE_TIMEOUT),
            target_rme: options.target_rme.unwrap_or(DEFAULT_TARGET_RME),
            warmup_iteration_count: options
                .warmup_iteration_count
                .unwrap_or(DEFAULT_WARMUP_ITERATION_COUNT),
            batch_iteration_count: options
                .batch_iteration_count
                .unwrap_or(DEFAULT_BATCH_ITERATION_COUNT),
            batch_timeout: options.batch_timeout.unwrap_or(DEFAULT_BATCH_TIMEOUT),
            batch_intermission_timeout: options
                .batch_intermission_timeout
                .unwrap_or(DEFAULT_BATCH_INTERMISSION_TIMEOUT),
        }
    }

    /// Pause between batches as a sleepable duration.
    ///
    /// Zero, negative and NaN values mean no pause. Values too large for a
    /// `Duration` are rejected.
    pub fn intermission(&self) -> Result<Duration, Error> {
        let ms = self.batch_intermission_timeout;
        if ms.is_nan() || ms <= 0.0 {
            return Ok(Duration::ZERO);
        }
        Duration::try_from_secs_f64(ms / 1000.0)
            .map_err(|e| Error::InvalidOption(format!("batch intermission timeout {ms} ms: {e}")))
    }
}

impl Default for MeasureSettings {
    fn default() -> Self {
        Self::resolve(&TestOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = MeasureSettings::default();
        assert_eq!(settings.measure_timeout, 10_000.0);
        assert_eq!(settings.target_rme, 0.05);
        assert_eq!(settings.warmup_iteration_count, 1);
        assert_eq!(settings.batch_iteration_count, u64::MAX);
        assert_eq!(settings.intermission().unwrap(), Duration::from_millis(200));
    }

    #[test]
    fn test_overrides() {
        let options = TestOptions::new()
            .with_measure_timeout(-1.0)
            .with_batch_intermission_timeout(0.0);
        let settings = MeasureSettings::resolve(&options);
        assert_eq!(settings.measure_timeout, -1.0);
        assert_eq!(settings.intermission().unwrap(), Duration::ZERO);
        assert_eq!(settings.batch_timeout, DEFAULT_BATCH_TIMEOUT);
    }

    #[test]
    fn test_unrepresentable_intermission_is_an_error() {
        let huge = MeasureSettings::resolve(
            &TestOptions::new().with_batch_intermission_timeout(f64::MAX),
        );
        assert!(matches!(huge.intermission(), Err(Error::InvalidOption(_))));

        let infinite = MeasureSettings::resolve(
            &TestOptions::new().with_batch_intermission_timeout(f64::INFINITY),
        );
        assert!(infinite.intermission().is_err());

        let nan =
            MeasureSettings::resolve(&TestOptions::new().with_batch_intermission_timeout(f64::NAN));
        assert_eq!(nan.intermission().unwrap(), Duration::ZERO);
    }
}
