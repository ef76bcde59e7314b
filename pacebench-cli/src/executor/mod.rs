//! Suite Executor
//!
//! Runs the planned suites and turns their event stream into output.
//!
//! ## Pipeline Overview
//!
//! ```text
//! RunPlan (suites + setups)
//!       │
//!       ▼
//! ┌─────────────┐
//! │  execution  │  Walk each suite, in-process or one worker per test
//! └──────┬──────┘
//!        │ LifecycleEvent stream
//!        ▼
//! ┌─────────────┐     ┌─────────────┐
//! │  progress   │     │  collector  │  Report (pacebench-report)
//! └─────────────┘     └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`execution`] - Suite execution (in-process and isolated)
//! - [`progress`] - Live console output
//! - [`metadata`] - System metadata collection

mod execution;
mod metadata;
mod progress;

pub use execution::{ExecutionConfig, Tee, execute_plan};
pub use metadata::build_report_meta;
pub use progress::ConsoleReporter;
