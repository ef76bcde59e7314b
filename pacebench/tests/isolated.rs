//! Isolated execution tests
//!
//! This binary is its own worker: the supervisor re-executes it with the
//! worker flag, which `pacebench::run()` routes to the worker entry point.

use pacebench::prelude::*;
use pacebench::{LifecycleEvent, NameFilter, SuitePlan, run_suite};
use pacebench_cli::{IsolatedExecutor, WORKER_FLAG};
use std::time::Duration;

#[pacebench::suite]
fn isolated_suite(rt: &mut Runtime) {
    rt.describe("group", |rt| {
        rt.test("measured", |ctx| {
            ctx.measure(|| {
                std::hint::black_box(21u64 * 2);
            })
        });
    });
    rt.test("aborts", |_| -> () {
        std::process::abort();
    });
    rt.test("after crash", |ctx| ctx.measure(|| {}));
}

fn quick() -> TestOptions {
    TestOptions::new()
        .with_measure_timeout(-1.0)
        .with_warmup_iteration_count(1)
        .with_batch_intermission_timeout(0.0)
}

fn run_isolated(filter: NameFilter) -> Vec<LifecycleEvent> {
    let plan = SuitePlan::resolve::<&str>("isolated_suite", &[]).unwrap();
    let binary = std::env::current_exe().unwrap();
    let mut executor =
        IsolatedExecutor::new(plan.name(), Vec::new(), quick(), Duration::from_secs(30))
            .with_binary(binary);
    let mut events = Vec::new();
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

/// Test that a worker process measures the test at its location and the
/// events come back in order
fn test_worker_relays_measured_test() {
    let events = run_isolated(NameFilter::new(&["^measured$"]).unwrap());

    assert!(
        !events.iter().any(LifecycleEvent::is_error),
        "unexpected errors: {events:?}"
    );
    assert_eq!(
        events.first(),
        Some(&LifecycleEvent::SuiteStart {
            name: "isolated_suite".to_string()
        })
    );
    assert!(events.contains(&LifecycleEvent::TestStart {
        name: "measured".to_string(),
        location: vec![0, 0],
    }));
    assert!(events.contains(&LifecycleEvent::MeasureStart));

    let ends: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            LifecycleEvent::TestEnd { name, duration, .. } => Some((name.as_str(), duration.size)),
            _ => None,
        })
        .collect();
    assert_eq!(ends, vec![("measured", 1)]);
}

/// Test that a crashing worker fails only its own test
fn test_crash_is_contained() {
    let events = run_isolated(NameFilter::all());

    let aborts_start = events
        .iter()
        .position(|e| matches!(e, LifecycleEvent::TestStart { name, .. } if name == "aborts"))
        .unwrap();
    assert!(matches!(
        &events[aborts_start + 1],
        LifecycleEvent::Error { message } if message.starts_with("Worker crashed")
    ));
    assert!(matches!(
        &events[aborts_start + 2],
        LifecycleEvent::TestEnd { name, duration, .. } if name == "aborts" && duration.is_empty()
    ));

    let sizes: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            LifecycleEvent::TestEnd { name, duration, .. } => Some((name.as_str(), duration.size)),
            _ => None,
        })
        .collect();
    assert_eq!(sizes, vec![("measured", 1), ("aborts", 0), ("after crash", 1)]);
}

fn main() {
    if std::env::args().any(|arg| arg == WORKER_FLAG) {
        if let Err(e) = pacebench::run() {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
        return;
    }

    let tests: [(&str, fn()); 2] = [
        ("test_worker_relays_measured_test", test_worker_relays_measured_test),
        ("test_crash_is_contained", test_crash_is_contained),
    ];
    for (name, test) in tests {
        test();
        println!("test {name} ... ok");
    }
}
