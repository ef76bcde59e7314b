#![warn(missing_docs)]
//! # Pacebench
//!
//! Adaptive micro-benchmark runner for Rust.
//!
//! - **Describe/test suites**: nest `describe` blocks, declare tests and
//!   attach lifecycle hooks at any level
//! - **Adaptive measurement**: warmup, then batches of iterations until the
//!   relative margin of error reaches its target or time runs out
//! - **Process isolation**: every test can run in its own worker process,
//!   which rebuilds only the path to that test
//! - **Heap tracking**: `TrackingAllocator` reports bytes per iteration
//!
//! ## Quick Start
//!
//! ```ignore
//! use pacebench::prelude::*;
//!
//! #[pacebench::suite]
//! fn sorting(rt: &mut Runtime) {
//!     rt.describe("sort_unstable", |rt| {
//!         rt.test("1k integers", |ctx| {
//!             let data: Vec<u32> = (0..1000).rev().collect();
//!             ctx.measure(move || {
//!                 let mut v = data.clone();
//!                 v.sort_unstable();
//!             })
//!         });
//!     });
//! }
//!
//! fn main() {
//!     if let Err(e) = pacebench::run() {
//!         eprintln!("{e:#}");
//!         std::process::exit(1);
//!     }
//! }
//! ```
//!
//! ## Hooks and Options
//!
//! ```ignore
//! rt.options(TestOptions::new().with_target_rme(0.01));
//! rt.before_each(|| reset_cache());
//! rt.test("lookup", |ctx| {
//!     ctx.before_iteration(|| shuffle_keys());
//!     ctx.measure_with(TestOptions::new().with_measure_timeout(2_000.0), || {
//!         lookup();
//!     })
//! });
//! ```

// Re-export engine types
pub use pacebench_core::{
    BuildMode, Error, HeapProbe, InProcessExecutor, LifecycleHooks, MemoryProbe, NameFilter,
    Outcome, REGISTRY_ANCHOR, Runtime, SetupDef, SuiteDef, SuitePlan, TestContext, TestExecutor,
    TrackingAllocator, Tree, resume, run_suite, setups, suites,
};

// Re-export macros
pub use pacebench_macros::{setup, suite};

// Re-export protocol and statistics types
pub use pacebench_ipc::{EventSink, LifecycleEvent, TestOptions};
pub use pacebench_report::{Report, ReportCollector};
pub use pacebench_stats::{Adder, Histogram, Stats};

/// Internal re-exports for macro use
#[doc(hidden)]
pub mod internal {
    pub use inventory;
    pub use tokio;
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Runtime, TestContext, TestOptions, setup, suite};
}

/// Run the Pacebench CLI harness.
///
/// Call this from your benchmark binary's `main()`:
/// ```ignore
/// fn main() {
///     pacebench::run().unwrap();
/// }
/// ```
pub use pacebench_cli::run;
