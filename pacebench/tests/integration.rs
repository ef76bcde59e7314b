//! Integration tests for Pacebench
//!
//! These tests drive registered suites end to end: registration, the
//! lifecycle walk, worker-style resumption and report collection.

use pacebench::prelude::*;
use pacebench::{
    InProcessExecutor, LifecycleEvent, NameFilter, ReportCollector, SuitePlan, run_suite,
};
use std::cell::{Cell, RefCell};

thread_local! {
    static LOG: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn log(entry: &str) {
    LOG.with(|log| log.borrow_mut().push(entry.to_string()));
}

fn take_log() -> Vec<String> {
    LOG.with(|log| std::mem::take(&mut *log.borrow_mut()))
}

fn quick() -> TestOptions {
    TestOptions::new()
        .with_measure_timeout(-1.0)
        .with_warmup_iteration_count(1)
        .with_batch_intermission_timeout(0.0)
}

#[pacebench::suite]
fn integration_hooks(rt: &mut Runtime) {
    rt.before_each(|| log("suite:before_each"));
    rt.after_each(|| log("suite:after_each"));
    rt.describe("outer", |rt| {
        rt.before_each(|| log("outer:before_each"));
        rt.before_iteration(|| log("outer:before_iteration"));
        rt.test("measured", |ctx| {
            log("body");
            ctx.before_iteration(|| log("test:before_iteration"));
            ctx.measure(|| log("callback"))
        });
    });
    rt.test("plain", |_| log("plain"));
}

#[pacebench::suite(name = "integration renamed")]
fn integration_locations(rt: &mut Runtime) {
    rt.describe("x", |rt| {
        rt.test("x0", |_| log("x0"));
    });
    rt.describe("y", |rt| {
        rt.test("y0", |_| log("y0"));
        rt.test("y1", |_| log("y1"));
    });
}

#[pacebench::suite]
fn integration_failures(rt: &mut Runtime) {
    rt.test("fails", |ctx| {
        ctx.measure(|| -> Result<(), String> { Err("always broken".to_string()) })
    });
    rt.describe("broken describe", |_| -> Result<(), String> {
        Err("cannot declare".to_string())
    });
    rt.test("passes", |ctx| ctx.measure(|| {}));
}

#[pacebench::suite]
fn integration_async(rt: &mut Runtime) {
    rt.test("yield", |ctx| {
        ctx.measure_async(|| async {
            pacebench::internal::tokio::task::yield_now().await;
        })
    });
}

#[pacebench::setup(name = "integration_tight_rme")]
fn tight_rme(rt: &mut Runtime) {
    rt.options(TestOptions::new().with_target_rme(0.001));
}

fn run_registered(name: &str, filter: NameFilter) -> Vec<LifecycleEvent> {
    let plan = SuitePlan::resolve::<&str>(name, &[]).unwrap();
    let mut events = Vec::new();
    let mut executor = InProcessExecutor::new();
    run_suite(
        plan.name(),
        |rt: &mut Runtime| plan.declare(rt),
        &filter,
        &quick(),
        &mut executor,
        &mut events,
    );
    events
}

/// Test that the attribute macros register suites and setups
#[test]
fn test_macros_register_definitions() {
    let suites: Vec<_> = pacebench::suites().iter().map(|s| s.name).collect();
    assert!(suites.contains(&"integration_hooks"));
    assert!(suites.contains(&"integration renamed"));
    assert!(!suites.contains(&"integration_locations"));

    let setups: Vec<_> = pacebench::setups().iter().map(|s| s.name).collect();
    assert!(setups.contains(&"integration_tight_rme"));

    let plan = SuitePlan::resolve("integration_hooks", &["integration_tight_rme"]).unwrap();
    assert!(plan.suite.file.ends_with("integration.rs"));
    assert_eq!(plan.setup_names(), vec!["integration_tight_rme"]);
}

/// Test the hook order of a full in-process walk
#[test]
fn test_hooks_run_outer_to_inner() {
    take_log();
    let events = run_registered("integration_hooks", NameFilter::all());
    assert!(!events.iter().any(LifecycleEvent::is_error));

    assert_eq!(
        take_log(),
        vec![
            "suite:before_each",
            "outer:before_each",
            "body",
            // one warmup iteration, then one measured iteration
            "outer:before_iteration",
            "test:before_iteration",
            "callback",
            "outer:before_iteration",
            "test:before_iteration",
            "callback",
            "suite:after_each",
            "suite:before_each",
            "plain",
            "suite:after_each",
        ]
    );
}

/// Test that the filter also enables tests through describe names
#[test]
fn test_filter_by_describe_name() {
    take_log();
    let events = run_registered("integration renamed", NameFilter::new(&["^Y$"]).unwrap());

    assert_eq!(take_log(), vec!["y0", "y1"]);
    assert!(!events.contains(&LifecycleEvent::DescribeStart {
        name: "x".to_string()
    }));
}

/// Test that resuming along a location runs exactly one test body
#[test]
fn test_resume_runs_single_test() {
    take_log();
    let plan = SuitePlan::resolve::<&str>("integration renamed", &[]).unwrap();
    let mut events = Vec::new();
    pacebench::resume(
        plan.name(),
        |rt: &mut Runtime| plan.declare(rt),
        &[1, 1],
        &quick(),
        &pacebench::HeapProbe,
        &mut events,
    )
    .unwrap();

    assert_eq!(take_log(), vec!["y1"]);
    assert_eq!(
        events.first(),
        Some(&LifecycleEvent::TestStart {
            name: "y1".to_string(),
            location: vec![1, 1],
        })
    );
    assert!(matches!(events.last(), Some(LifecycleEvent::TestEnd { .. })));

    let error = pacebench::resume(
        plan.name(),
        |rt: &mut Runtime| plan.declare(rt),
        &[2],
        &quick(),
        &pacebench::HeapProbe,
        &mut Vec::new(),
    );
    assert!(matches!(error, Err(pacebench::Error::InvalidLocation(_))));
}

/// Test that failures reach the report without stopping the suite
#[test]
fn test_failures_are_reported() {
    let events = run_registered("integration_failures", NameFilter::all());

    let measure_errors = events
        .iter()
        .filter(|e| matches!(e, LifecycleEvent::MeasureError { .. }))
        .count();
    assert_eq!(measure_errors, 1);

    let mut collector = ReportCollector::new();
    for event in events {
        pacebench::EventSink::emit(&mut collector, event);
    }
    let report = collector.finish(pacebench_cli::build_report_meta(&quick(), false));

    assert!(report.has_failures());
    let suite = &report.suites[0];
    assert_eq!(suite.name, "integration_failures");
    assert_eq!(suite.errors, vec!["cannot declare"]);
    let names: Vec<_> = suite.tests.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["fails", "passes"]);
    assert_eq!(suite.tests[0].errors, vec!["always broken"]);
    assert_eq!(suite.tests[0].status, pacebench_report::TestStatus::Failed);
    assert!(suite.tests[1].errors.is_empty());
    assert_eq!(suite.tests[1].duration.size, 1);
}

/// Grows by a fixed amount on every snapshot
struct GrowingHeap(Cell<u64>);

impl pacebench::MemoryProbe for GrowingHeap {
    fn heap_in_use(&self) -> u64 {
        let next = self.0.get() + 64;
        self.0.set(next);
        next
    }
}

/// Test that heap growth per iteration reaches the test statistics
#[test]
fn test_memory_probe_feeds_statistics() {
    let plan = SuitePlan::resolve::<&str>("integration_async", &[]).unwrap();
    let mut events = Vec::new();
    let mut executor = InProcessExecutor::with_probe(GrowingHeap(Cell::new(0)));
    run_suite(
        plan.name(),
        |rt: &mut Runtime| plan.declare(rt),
        &NameFilter::all(),
        &quick(),
        &mut executor,
        &mut events,
    );

    let memory = events.iter().find_map(|e| match e {
        LifecycleEvent::TestEnd { memory, .. } => Some(*memory),
        _ => None,
    });
    let memory = memory.unwrap();
    assert_eq!(memory.size, 1);
    assert_eq!(memory.mean, 64.0);
}

/// Test async measurement on the built-in runtime
#[test]
fn test_async_measurement() {
    let events = run_registered("integration_async", NameFilter::all());

    assert!(!events.iter().any(LifecycleEvent::is_error));
    assert!(matches!(
        events.iter().find(|e| matches!(e, LifecycleEvent::TestEnd { .. })),
        Some(LifecycleEvent::TestEnd { duration, .. }) if duration.size == 1
    ));
}

/// Test that setups apply their options to every test
#[test]
fn test_setup_options_reach_tests() {
    let plan = SuitePlan::resolve("integration_hooks", &["integration_tight_rme"]).unwrap();
    let tree = pacebench::Tree::build(
        plan.name(),
        pacebench::BuildMode::Discover,
        NameFilter::all(),
        quick(),
        |rt: &mut Runtime| plan.declare(rt),
    )
    .unwrap();

    let measured = tree.find(&[0, 0]).unwrap();
    assert_eq!(tree.node(measured).name(), "measured");
    assert_eq!(tree.node(measured).options().target_rme, Some(0.001));
    assert_eq!(tree.node(measured).options().measure_timeout, Some(-1.0));
}
