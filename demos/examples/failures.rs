//! Failure Handling
//!
//! Failures are reported next to the test they belong to and never stop the
//! rest of the run. With isolation (the default) even a process abort only
//! fails the test that caused it.
//!
//! Run with:
//!   cargo run --example failures -p pacebench-demos --release
//!   cargo run --example failures -p pacebench-demos --release -- --isolated=false
//!
//! In-process, the run ends at `aborts`. The run exits with status 1 because
//! failures are present.

use pacebench::prelude::*;
use std::hint::black_box;
use std::sync::atomic::{AtomicU32, Ordering};

#[suite]
fn failures(rt: &mut Runtime) {
    rt.test("healthy before", |ctx| {
        ctx.measure(|| {
            black_box(42u64.wrapping_mul(17));
        })
    });

    // Reported once: identical consecutive errors collapse
    rt.test("always errors", |ctx| {
        ctx.measure(|| -> Result<(), String> { Err("checksum mismatch".to_string()) })
    });

    rt.test("panics after warmup", |ctx| {
        static CALLS: AtomicU32 = AtomicU32::new(0);
        ctx.measure(|| {
            let n = CALLS.fetch_add(1, Ordering::SeqCst);
            if n >= 5 {
                panic!("gave up after {n} calls");
            }
            black_box(n);
        })
    });

    rt.describe("broken fixture", |rt| -> Result<(), String> {
        rt.test("never declared", |ctx| ctx.measure(|| {}));
        Err("fixture file missing".to_string())
    });

    rt.test("aborts", |_| -> () {
        std::process::abort();
    });

    rt.test("healthy after", |ctx| {
        let data: Vec<u64> = (0..100).collect();
        ctx.measure(move || {
            black_box(data.iter().sum::<u64>());
        })
    });
}

fn main() {
    if let Err(e) = pacebench::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
