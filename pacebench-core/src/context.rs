//! Test Context
//!
//! Handed to a test body. Each `measure` call runs one full measurement
//! cycle before returning, so measurements of a test never overlap, and
//! their samples are merged into the test's statistics.

use crate::allocator::MemoryProbe;
use crate::cycle::MeasureCycle;
use crate::error::Error;
use crate::hooks::{HookKind, LifecycleHooks, Outcome, hook};
use crate::settings::MeasureSettings;
use pacebench_ipc::{EventSink, TestOptions};
use pacebench_stats::Histogram;
use std::future::Future;

/// Per-test handle for running measurements
pub struct TestContext<'a> {
    hooks: LifecycleHooks,
    options: TestOptions,
    probe: &'a dyn MemoryProbe,
    sink: &'a mut dyn EventSink,
    duration: Histogram,
    memory: Histogram,
    failure: Option<Error>,
    runtime: Option<tokio::runtime::Runtime>,
}

impl<'a> TestContext<'a> {
    pub(crate) fn new(
        hooks: LifecycleHooks,
        options: TestOptions,
        probe: &'a dyn MemoryProbe,
        sink: &'a mut dyn EventSink,
    ) -> Self {
        Self {
            hooks,
            options,
            probe,
            sink,
            duration: Histogram::new(),
            memory: Histogram::new(),
            failure: None,
            runtime: None,
        }
    }

    /// Options in effect for this test
    pub fn options(&self) -> &TestOptions {
        &self.options
    }

    /// Measure `callback` with the test's options
    pub fn measure<F, O>(&mut self, callback: F) -> Result<(), Error>
    where
        F: FnMut() -> O,
        O: Outcome,
    {
        self.measure_with(TestOptions::default(), callback)
    }

    /// Measure `callback` with option overrides for this measurement only.
    ///
    /// Returns once the cycle has finished. Failures of `callback` are
    /// reported as events and do not fail the call; a failing hook does, and
    /// marks the whole test as failed.
    pub fn measure_with<F, O>(&mut self, options: TestOptions, callback: F) -> Result<(), Error>
    where
        F: FnMut() -> O,
        O: Outcome,
    {
        if self.failure.is_some() {
            return Err(Error::Aborted);
        }

        let settings = MeasureSettings::resolve(&self.options.overlay(&options));
        let cycle = MeasureCycle::new(&settings, &self.hooks, self.probe);

        match cycle.run(callback, &mut *self.sink) {
            Ok(result) => {
                self.duration.add_population(&result.duration);
                self.memory.add_population(&result.memory);
                Ok(())
            }
            Err(error) => {
                let message = error.to_string();
                self.failure = Some(error);
                Err(Error::Failed(message))
            }
        }
    }

    /// Measure an async callback, driving each future to completion on a
    /// current-thread tokio runtime owned by this test
    pub fn measure_async<F, Fut, O>(&mut self, callback: F) -> Result<(), Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = O>,
        O: Outcome,
    {
        self.measure_async_with(TestOptions::default(), callback)
    }

    /// [`measure_async`](Self::measure_async) with option overrides
    pub fn measure_async_with<F, Fut, O>(
        &mut self,
        options: TestOptions,
        mut callback: F,
    ) -> Result<(), Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = O>,
        O: Outcome,
    {
        // Reuse the runtime across measurements to keep construction out of
        // the samples
        let runtime = match self.runtime.take() {
            Some(runtime) => runtime,
            None => tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?,
        };
        let result = self.measure_with(options, || runtime.block_on(callback()));
        self.runtime = Some(runtime);
        result
    }

    fn add_hook<F, O>(&mut self, kind: HookKind, f: F)
    where
        F: Fn() -> O + 'static,
        O: Outcome,
    {
        self.hooks.add(kind, hook(f));
    }

    /// Run before the warmup of later measurements of this test
    pub fn before_warmup<F, O>(&mut self, f: F)
    where
        F: Fn() -> O + 'static,
        O: Outcome,
    {
        self.add_hook(HookKind::BeforeWarmup, f);
    }

    /// Run after the warmup of later measurements of this test
    pub fn after_warmup<F, O>(&mut self, f: F)
    where
        F: Fn() -> O + 'static,
        O: Outcome,
    {
        self.add_hook(HookKind::AfterWarmup, f);
    }

    /// Run before each batch of later measurements of this test
    pub fn before_batch<F, O>(&mut self, f: F)
    where
        F: Fn() -> O + 'static,
        O: Outcome,
    {
        self.add_hook(HookKind::BeforeBatch, f);
    }

    /// Run after each batch of later measurements of this test
    pub fn after_batch<F, O>(&mut self, f: F)
    where
        F: Fn() -> O + 'static,
        O: Outcome,
    {
        self.add_hook(HookKind::AfterBatch, f);
    }

    /// Run before each iteration of later measurements of this test
    pub fn before_iteration<F, O>(&mut self, f: F)
    where
        F: Fn() -> O + 'static,
        O: Outcome,
    {
        self.add_hook(HookKind::BeforeIteration, f);
    }

    /// Run after each iteration of later measurements of this test
    pub fn after_iteration<F, O>(&mut self, f: F)
    where
        F: Fn() -> O + 'static,
        O: Outcome,
    {
        self.add_hook(HookKind::AfterIteration, f);
    }

    pub(crate) fn take_failure(&mut self) -> Option<Error> {
        self.failure.take()
    }

    /// Merged duration and memory histograms
    pub(crate) fn finish(self) -> (Histogram, Histogram) {
        (self.duration, self.memory)
    }
}
