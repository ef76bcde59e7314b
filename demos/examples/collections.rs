//! Collection Benchmarks
//!
//! Nested describes with more than one measurement per test. Heap usage per
//! iteration is reported because the tracking allocator is installed.
//!
//! Run with: cargo run --example collections -p pacebench-demos --release
//! Filter:   cargo run --example collections -p pacebench-demos --release -- hash

use pacebench::TrackingAllocator;
use pacebench::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::hint::black_box;

#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator;

#[suite]
fn collections(rt: &mut Runtime) {
    rt.describe("vec", |rt| {
        rt.test("push 1k", |ctx| {
            ctx.measure(|| {
                let mut v = Vec::new();
                for i in 0..1_000u64 {
                    v.push(i);
                }
                black_box(v);
            })
        });

        rt.test("with_capacity 1k", |ctx| {
            ctx.measure(|| {
                let mut v = Vec::with_capacity(1_000);
                for i in 0..1_000u64 {
                    v.push(i);
                }
                black_box(v);
            })
        });
    });

    rt.describe("maps", |rt| {
        rt.describe("hash", |rt| {
            rt.test("insert then lookup", |ctx| {
                // Both measurements are merged into this test's statistics
                ctx.measure(|| {
                    let map: HashMap<u64, u64> = (0..256).map(|i| (i, i * i)).collect();
                    black_box(map);
                })?;
                let map: HashMap<u64, u64> = (0..256).map(|i| (i, i * i)).collect();
                ctx.measure(move || {
                    black_box(map.get(&black_box(128)));
                })
            });
        });

        rt.describe("btree", |rt| {
            rt.test("insert then lookup", |ctx| {
                let map: BTreeMap<u64, u64> = (0..256).map(|i| (i, i * i)).collect();
                ctx.measure(move || {
                    black_box(map.get(&black_box(128)));
                })
            });
        });
    });
}

fn main() {
    if let Err(e) = pacebench::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
