//! Suite Execution
//!
//! ## Execution Modes
//!
//! - **In-process**: every test body runs inside this process. Fast, but a
//!   crash in one test ends the run.
//!
//! - **Isolated**: the master declares each suite without keeping test
//!   bodies and hands every enabled test to a fresh worker process, which
//!   rebuilds the suite along the test's location and runs only that body.

use crate::planner::RunPlan;
use crate::supervisor::IsolatedExecutor;
use pacebench_core::{InProcessExecutor, NameFilter, Runtime, TestExecutor, run_suite};
use pacebench_ipc::{EventSink, LifecycleEvent, TestOptions};
use std::time::Duration;
use tracing::info;

/// Run-wide execution settings
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Test name filter
    pub filter: NameFilter,
    /// Options at the suite root
    pub options: TestOptions,
    /// One worker process per test
    pub isolated: bool,
    /// Lifetime limit of one worker
    pub worker_timeout: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            filter: NameFilter::all(),
            options: TestOptions::default(),
            isolated: true,
            worker_timeout: Duration::from_secs(60),
        }
    }
}

/// Feeds every event to two sinks, in order
pub struct Tee<A, B>(pub A, pub B);

impl<A: EventSink, B: EventSink> EventSink for Tee<A, B> {
    fn emit(&mut self, event: LifecycleEvent) {
        self.0.emit(event.clone());
        self.1.emit(event);
    }
}

/// Run every suite of the plan, in order
pub fn execute_plan(plan: &RunPlan, config: &ExecutionConfig, sink: &mut dyn EventSink) {
    for suite in &plan.suites {
        info!(suite = suite.name(), isolated = config.isolated, "running suite");

        let mut executor: Box<dyn TestExecutor> = if config.isolated {
            Box::new(IsolatedExecutor::new(
                suite.name(),
                suite.setup_names(),
                config.options.clone(),
                config.worker_timeout,
            ))
        } else {
            Box::new(InProcessExecutor::new())
        };

        run_suite(
            suite.name(),
            |rt: &mut Runtime| suite.declare(rt),
            &config.filter,
            &config.options,
            executor.as_mut(),
            sink,
        );
    }
}
