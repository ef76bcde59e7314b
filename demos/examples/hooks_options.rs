//! Lifecycle Hooks and Options
//!
//! Hooks registered on a scope apply to every test below it, outer scopes
//! first. Options overlay from the run-wide defaults down to a single
//! measurement.
//!
//! Run with: cargo run --example hooks_options -p pacebench-demos --release
//! Every registered setup applies unless `--setup` names a subset.

use pacebench::prelude::*;
use std::cell::RefCell;
use std::hint::black_box;
use std::rc::Rc;

/// Shorter measurements for every suite of this binary
#[setup]
fn quick(rt: &mut Runtime) {
    rt.options(
        TestOptions::new()
            .with_measure_timeout(500.0)
            .with_batch_intermission_timeout(0.0),
    );
}

#[suite]
fn sorting(rt: &mut Runtime) {
    rt.options(TestOptions::new().with_target_rme(0.02));

    let data = Rc::new(RefCell::new(Vec::<u32>::new()));

    rt.describe("sort_unstable", |rt| {
        let fill = Rc::clone(&data);
        rt.before_each(move || {
            *fill.borrow_mut() = (0..10_000u32).rev().collect();
        });

        let input = Rc::clone(&data);
        rt.test("10k reversed", move |ctx| {
            let scratch = Rc::new(RefCell::new(Vec::new()));
            let refill = Rc::clone(&scratch);
            // The copy is made outside the timed region
            ctx.before_iteration(move || {
                refill.borrow_mut().clone_from(&input.borrow());
            });
            ctx.measure(move || {
                scratch.borrow_mut().sort_unstable();
                black_box(scratch.borrow().first().copied());
            })
        });
    });

    rt.describe_with(
        "sort (stable)",
        TestOptions::new().with_warmup_iteration_count(3),
        |rt| {
            rt.test("1k reversed", |ctx| {
                let source: Vec<u32> = (0..1_000u32).rev().collect();
                ctx.measure_with(TestOptions::new().with_batch_iteration_count(50), || {
                    let mut v = source.clone();
                    v.sort();
                    black_box(v);
                })
            });
        },
    );
}

fn main() {
    if let Err(e) = pacebench::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
