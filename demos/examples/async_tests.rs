//! Async Measurements
//!
//! `measure_async` drives every future on a current-thread tokio runtime
//! owned by the test, so spawned tasks and timers work inside the callback.
//!
//! Run with: cargo run --example async_tests -p pacebench-demos --release

use pacebench::prelude::*;
use std::hint::black_box;
use std::time::Duration;

#[suite]
fn async_runtime(rt: &mut Runtime) {
    rt.test("ready future", |ctx| {
        ctx.measure_async(|| async {
            black_box(42u64);
        })
    });

    rt.test("yield_now", |ctx| {
        ctx.measure_async(|| async {
            tokio::task::yield_now().await;
        })
    });

    rt.test("spawn and join 16", |ctx| {
        ctx.measure_async(|| async {
            let mut handles = Vec::with_capacity(16);
            for i in 0u64..16 {
                handles.push(tokio::spawn(async move { black_box(i * i) }));
            }
            let mut sum = 0u64;
            for handle in handles {
                sum += handle.await.map_err(|e| e.to_string())?;
            }
            black_box(sum);
            Ok::<(), String>(())
        })
    });

    rt.test_with(
        "sleep 1ms",
        TestOptions::new().with_measure_timeout(1_000.0),
        |ctx| {
            ctx.measure_async(|| async {
                tokio::time::sleep(Duration::from_millis(1)).await;
            })
        },
    );
}

fn main() {
    if let Err(e) = pacebench::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
