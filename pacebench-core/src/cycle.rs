//! Measurement Cycle
//!
//! Adaptive sampler behind `measure()`: warmup, then batches of timed
//! iterations until either the measurement timeout elapses or the relative
//! margin of error reaches the target.
//!
//! ```text
//! warmup:   beforeWarmup, beforeBatch, N x iteration, afterBatch, afterWarmup, pause
//! measure:  beforeBatch, iteration...
//!             stop?     -> afterBatch, done
//!             boundary? -> afterBatch, pause, beforeBatch
//! iteration: beforeIteration, heap snapshot, timed callback, heap delta, afterIteration
//! ```
//!
//! Failures of the measured callback never leave the cycle: they are
//! reported as `MeasureError` events and the iteration still counts, so a
//! callback that always fails ends on the timeout. Hook failures abort the
//! cycle and are returned to the caller.

use crate::allocator::MemoryProbe;
use crate::error::Error;
use crate::hooks::{LifecycleHooks, Outcome, catch, run_hook};
use crate::settings::MeasureSettings;
use crate::timing::Timer;
use pacebench_ipc::{EventSink, LifecycleEvent};
use pacebench_stats::Histogram;
use std::time::Duration;
use tracing::debug;

/// Samples collected by one cycle
#[derive(Debug, Clone, Default)]
pub struct MeasureResult {
    /// Per-iteration durations (ms)
    pub duration: Histogram,
    /// Positive per-iteration heap growth (bytes)
    pub memory: Histogram,
}

/// One `measure()` invocation
pub struct MeasureCycle<'a> {
    settings: &'a MeasureSettings,
    hooks: &'a LifecycleHooks,
    probe: &'a dyn MemoryProbe,
}

impl<'a> MeasureCycle<'a> {
    /// Prepare a cycle
    pub fn new(
        settings: &'a MeasureSettings,
        hooks: &'a LifecycleHooks,
        probe: &'a dyn MemoryProbe,
    ) -> Self {
        Self {
            settings,
            hooks,
            probe,
        }
    }

    /// Run the cycle to completion.
    ///
    /// Returns `Err` only when a hook fails.
    pub fn run<F, O>(
        &self,
        mut callback: F,
        sink: &mut dyn EventSink,
    ) -> Result<MeasureResult, Error>
    where
        F: FnMut() -> O,
        O: Outcome,
    {
        let settings = self.settings;
        let hooks = self.hooks;
        let intermission = settings.intermission()?;
        let mut errors = ErrorReporter::default();

        if settings.warmup_iteration_count > 0 {
            sink.emit(LifecycleEvent::MeasureWarmupStart);
            run_hook(&hooks.before_warmup)?;
            run_hook(&hooks.before_batch)?;

            for _ in 0..settings.warmup_iteration_count {
                run_hook(&hooks.before_iteration)?;
                if let Err(error) = invoke(&mut callback) {
                    errors.report(sink, error);
                }
                run_hook(&hooks.after_iteration)?;
            }

            run_hook(&hooks.after_batch)?;
            run_hook(&hooks.after_warmup)?;
            sink.emit(LifecycleEvent::MeasureWarmupEnd);
            pause(intermission);
        }

        sink.emit(LifecycleEvent::MeasureStart);

        let mut result = MeasureResult::default();
        let mut progress = Progress::new(sink);
        let measure_timer = Timer::start();

        run_hook(&hooks.before_batch)?;
        let mut batch_timer = Timer::start();
        let mut batch_iterations = 0u64;

        loop {
            batch_iterations += 1;

            run_hook(&hooks.before_iteration)?;
            let heap_before = self.probe.heap_in_use();
            let timer = Timer::start();
            let outcome = invoke(&mut callback);
            let elapsed = timer.elapsed_ms();
            let heap_after = self.probe.heap_in_use();

            result.duration.add(elapsed);
            if heap_after > heap_before {
                result.memory.add((heap_after - heap_before) as f64);
            }
            if let Err(error) = outcome {
                errors.report(sink, error);
            }
            run_hook(&hooks.after_iteration)?;

            let measure_elapsed = measure_timer.elapsed_ms();
            let size = result.duration.size();
            let rme = result.duration.rme();

            if measure_elapsed > settings.measure_timeout || (size > 2 && rme <= settings.target_rme)
            {
                progress.advance(sink, 1.0);
                run_hook(&hooks.after_batch)?;
                break;
            }

            progress.advance(sink, estimate(settings, measure_elapsed, size, rme));

            if batch_timer.elapsed_ms() > settings.batch_timeout
                || batch_iterations >= settings.batch_iteration_count
            {
                run_hook(&hooks.after_batch)?;
                pause(intermission);
                run_hook(&hooks.before_batch)?;
                batch_timer = Timer::start();
                batch_iterations = 0;
            }
        }

        debug!(
            iterations = result.duration.size(),
            elapsed_ms = measure_timer.elapsed_ms(),
            rme = result.duration.rme(),
            "measurement finished"
        );

        sink.emit(LifecycleEvent::MeasureEnd {
            duration: result.duration.stats(),
            memory: result.memory.stats(),
        });
        Ok(result)
    }

}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}

#[inline(always)]
fn invoke<F, O>(callback: &mut F) -> Result<(), Error>
where
    F: FnMut() -> O,
    O: Outcome,
{
    catch(|| callback().into_result())
}

/// Progress candidate: the larger of the time-based and precision-based
/// estimates. The precision estimate needs at least 3 samples.
fn estimate(settings: &MeasureSettings, elapsed: f64, size: u64, rme: f64) -> f64 {
    let by_time = if settings.measure_timeout > 0.0 {
        elapsed / settings.measure_timeout
    } else {
        1.0
    };
    let by_precision = if size > 2 && rme > 0.0 {
        settings.target_rme / rme
    } else {
        0.0
    };
    let candidate = by_time.max(by_precision);
    if candidate.is_finite() { candidate } else { 0.0 }
}

/// Non-decreasing progress, truncated to 3 decimals, emitted on change only
struct Progress {
    value: f64,
}

impl Progress {
    fn new(sink: &mut dyn EventSink) -> Self {
        sink.emit(LifecycleEvent::MeasureProgress { percent: 0.0 });
        Self { value: 0.0 }
    }

    fn advance(&mut self, sink: &mut dyn EventSink, candidate: f64) {
        let next = (candidate.clamp(self.value, 1.0) * 1000.0).trunc() / 1000.0;
        if next > self.value {
            self.value = next;
            sink.emit(LifecycleEvent::MeasureProgress { percent: next });
        }
    }
}

/// Collapses runs of identical error messages
#[derive(Default)]
struct ErrorReporter {
    last: Option<String>,
}

impl ErrorReporter {
    fn report(&mut self, sink: &mut dyn EventSink, error: Error) {
        let message = error.to_string();
        if self.last.as_deref() == Some(message.as_str()) {
            return;
        }
        self.last = Some(message.clone());
        sink.emit(LifecycleEvent::MeasureError { message });
    }
}
