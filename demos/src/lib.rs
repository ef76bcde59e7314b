//! Pacebench Demos
//!
//! Runnable demonstrations of Pacebench suites. This crate is not
//! published; it only hosts examples that depend on `pacebench`.
//!
//! Run any example with:
//! ```sh
//! cargo run --example <name> -p pacebench-demos --release
//! ```
//!
//! | Example | Feature |
//! |---------|---------|
//! | `collections` | Nested describes, multiple measurements, `TrackingAllocator` |
//! | `hooks_options` | Lifecycle hooks, scope options, `#[setup]` |
//! | `async_tests` | `measure_async` on the per-test tokio runtime |
//! | `failures` | Failing callbacks, failing describes, crash isolation |
