#![warn(missing_docs)]
//! Pacebench Core - Measurement Engine
//!
//! This crate provides the parts of pacebench that run user code:
//! - [`MeasureCycle`], the adaptive warmup/batch/iteration loop
//! - The declaration tree ([`Runtime`], [`Tree`]) and the lifecycle walker
//! - Suite and setup registration for `#[pacebench::suite]`
//! - [`WorkerMain`], the worker side of the isolated runner

mod allocator;
mod context;
mod cycle;
mod error;
mod filter;
mod hooks;
mod registry;
mod settings;
mod timing;
mod tree;
mod walker;
mod worker;

pub use allocator::{HeapProbe, MemoryProbe, TrackingAllocator, heap_in_use, is_tracking};
pub use context::TestContext;
pub use cycle::{MeasureCycle, MeasureResult};
pub use error::Error;
pub use filter::NameFilter;
pub use hooks::{Hook, HookKind, LifecycleHooks, Outcome, catch, combine, hook, run_hook};
pub use registry::{DeclareFn, REGISTRY_ANCHOR, SetupDef, SuiteDef, SuitePlan, setups, suites};
pub use settings::{
    DEFAULT_BATCH_INTERMISSION_TIMEOUT, DEFAULT_BATCH_ITERATION_COUNT, DEFAULT_BATCH_TIMEOUT,
    DEFAULT_MEASURE_TIMEOUT, DEFAULT_TARGET_RME, DEFAULT_WARMUP_ITERATION_COUNT, MeasureSettings,
};
pub use timing::{Timer, pin_to_cpu};
pub use tree::{BuildMode, Node, NodeId, NodeKind, Runtime, Tree};
pub use walker::{InProcessExecutor, TestExecutor, resume, run_suite, run_test, walk};
pub use worker::WorkerMain;
