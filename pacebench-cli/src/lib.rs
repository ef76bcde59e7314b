#![warn(missing_docs)]
//! Pacebench CLI Library
//!
//! Command line harness for benchmark binaries. Call `pacebench::run()` (or
//! `pacebench_cli::run()`) from `main` to get the full CLI over every
//! registered suite.
//!
//! # Example
//!
//! ```ignore
//! use pacebench::prelude::*;
//!
//! #[pacebench::suite]
//! fn parsing(rt: &mut Runtime) {
//!     rt.test("small document", |ctx| ctx.measure(|| { parse(SMALL); }));
//! }
//!
//! fn main() {
//!     if let Err(e) = pacebench::run() {
//!         eprintln!("{e:#}");
//!         std::process::exit(1);
//!     }
//! }
//! ```

mod config;
mod executor;
mod planner;
mod supervisor;

pub use config::*;
pub use executor::{ConsoleReporter, ExecutionConfig, Tee, build_report_meta, execute_plan};
pub use planner::{RunPlan, build_plan};
pub use supervisor::*;

use anyhow::Context;
use clap::Parser;
use pacebench_core::{BuildMode, NameFilter, NodeId, NodeKind, Runtime, Tree, WorkerMain};
use pacebench_ipc::TestOptions;
use pacebench_report::{OutputFormat, ReportCollector, format_summary, generate_json_report};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Pacebench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "pacebench")]
#[command(version, about = "Pacebench - adaptive micro-benchmark runner")]
pub struct Cli {
    /// Test name patterns (regex, case-insensitive); a test runs when any
    /// pattern matches its name or an enclosing describe name
    pub filter: Vec<String>,

    /// Suite name patterns to run (repeatable)
    #[arg(long)]
    pub include: Vec<String>,

    /// Setup name patterns to apply (repeatable); all setups by default
    #[arg(long)]
    pub setup: Vec<String>,

    /// Maximum measurement time per measure call, in milliseconds
    #[arg(long, value_name = "MS")]
    pub measure_timeout: Option<f64>,

    /// Stop measuring once the relative margin of error drops to this fraction
    #[arg(long, value_name = "FRACTION")]
    pub target_rme: Option<f64>,

    /// Iterations run before measurement
    #[arg(long, value_name = "N")]
    pub warmup_iterations: Option<u64>,

    /// Maximum iterations per batch
    #[arg(long, value_name = "N")]
    pub batch_iterations: Option<u64>,

    /// Maximum batch duration, in milliseconds
    #[arg(long, value_name = "MS")]
    pub batch_timeout: Option<f64>,

    /// Pause between batches, in milliseconds
    #[arg(long, value_name = "MS")]
    pub batch_intermission: Option<f64>,

    /// Run each test in its own worker process (default: true)
    /// Use --isolated=false to run in-process
    #[arg(long, num_args = 0..=1, default_missing_value = "true", action = clap::ArgAction::Set)]
    pub isolated: Option<bool>,

    /// Worker timeout (e.g. "60s", "5m")
    #[arg(long, value_name = "DURATION")]
    pub worker_timeout: Option<String>,

    /// Output format: human, json
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Configuration file (default: discover pace.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// List suites and tests without running them
    #[arg(long)]
    pub list: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Internal: Run as worker process (used by supervisor)
    #[arg(long = "pace-worker", hide = true)]
    pub pace_worker: bool,

    /// Internal: Absorb cargo bench's --bench flag
    #[arg(long, hide = true)]
    pub bench: bool,
}

impl Cli {
    /// Option overrides given on the command line
    pub fn options(&self) -> TestOptions {
        TestOptions {
            measure_timeout: self.measure_timeout,
            target_rme: self.target_rme,
            warmup_iteration_count: self.warmup_iterations,
            batch_iteration_count: self.batch_iterations,
            batch_timeout: self.batch_timeout,
            batch_intermission_timeout: self.batch_intermission,
        }
    }
}

/// Effective run settings: defaults, then `pace.toml`, then CLI flags
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Suite selectors
    pub include: Vec<String>,
    /// Setup selectors
    pub setup: Vec<String>,
    /// Test name patterns
    pub filter: Vec<String>,
    /// Options at the suite root
    pub options: TestOptions,
    /// One worker process per test
    pub isolated: bool,
    /// Lifetime limit of one worker
    pub worker_timeout: Duration,
    /// Report format
    pub format: OutputFormat,
    /// Report destination (stdout when `None`)
    pub output: Option<PathBuf>,
}

impl RunSettings {
    /// Layer CLI flags over the configuration and validate the result
    pub fn resolve(cli: &Cli, config: &PaceConfig) -> Result<Self, ConfigError> {
        let pick = |cli: &Vec<String>, config: &Vec<String>| {
            if cli.is_empty() {
                config.clone()
            } else {
                cli.clone()
            }
        };

        let options = config.options.overlay(&cli.options());
        validate_options(&options)?;

        let worker_timeout = match &cli.worker_timeout {
            Some(value) => parse_duration(value)?,
            None => config.worker_timeout()?,
        };

        Ok(Self {
            include: pick(&cli.include, &config.include),
            setup: pick(&cli.setup, &config.setup),
            filter: pick(&cli.filter, &config.filter),
            options,
            isolated: cli.isolated.unwrap_or(config.runner.isolated),
            worker_timeout,
            format: cli.format.unwrap_or(config.output.format),
            output: cli.output.clone().or_else(|| config.output.path.clone()),
        })
    }
}

/// Run the Pacebench CLI with the process arguments.
/// This is the main entry point for benchmark binaries.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the Pacebench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Worker mode comes before any other initialization
    if cli.pace_worker {
        return run_worker_mode();
    }

    let default_filter = if cli.verbose {
        "pacebench=debug"
    } else {
        "pacebench=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let config = match &cli.config {
        Some(path) => PaceConfig::load(path)?,
        None => match PaceConfig::discover()? {
            Some((path, config)) => {
                tracing::debug!(path = %path.display(), "loaded configuration");
                config
            }
            None => PaceConfig::default(),
        },
    };
    let settings = RunSettings::resolve(&cli, &config)?;

    let include = NameFilter::new(&settings.include).context("invalid --include pattern")?;
    let setup_filter = NameFilter::new(&settings.setup).context("invalid --setup pattern")?;
    let filter = NameFilter::new(&settings.filter).context("invalid test filter")?;

    let plan = build_plan(
        pacebench_core::suites(),
        pacebench_core::setups(),
        &include,
        &setup_filter,
    );

    if cli.list {
        list_suites(&plan, &filter, &settings.options);
        return Ok(());
    }

    if plan.is_empty() {
        println!("No suites found.");
        return Ok(());
    }

    if run_suites(&plan, filter, &settings)? {
        std::process::exit(1);
    }
    Ok(())
}

/// Run as a worker process (IPC mode)
fn run_worker_mode() -> anyhow::Result<()> {
    let mut worker = WorkerMain::new();
    worker
        .run()
        .map_err(|e| anyhow::anyhow!("Worker error: {}", e))
}

/// Run the plan; returns `true` when any fatal or test error occurred
fn run_suites(plan: &RunPlan, filter: NameFilter, settings: &RunSettings) -> anyhow::Result<bool> {
    let config = ExecutionConfig {
        filter,
        options: settings.options.clone(),
        isolated: settings.isolated,
        worker_timeout: settings.worker_timeout,
    };

    let meta = build_report_meta(&settings.options, settings.isolated);
    let report = match settings.format {
        OutputFormat::Human => {
            let out: Box<dyn Write> = match &settings.output {
                Some(path) => Box::new(std::fs::File::create(path).with_context(|| {
                    format!("failed to create {}", path.display())
                })?),
                None => Box::new(std::io::stdout()),
            };
            let show_progress = settings.output.is_none() && std::io::stderr().is_terminal();
            let mut sink = Tee(ConsoleReporter::new(out, show_progress), ReportCollector::new());
            execute_plan(plan, &config, &mut sink);

            let Tee(console, collector) = sink;
            let report = collector.finish(meta);
            let mut out = console.into_inner();
            write!(out, "{}", format_summary(&report))?;
            out.flush()?;
            report
        }
        OutputFormat::Json => {
            let mut collector = ReportCollector::new();
            execute_plan(plan, &config, &mut collector);
            let report = collector.finish(meta);

            let json = generate_json_report(&report)?;
            match &settings.output {
                Some(path) => {
                    std::fs::write(path, json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    eprintln!("Report written to: {}", path.display());
                }
                None => println!("{}", json),
            }
            report
        }
    };

    Ok(report.has_failures())
}

fn list_suites(plan: &RunPlan, filter: &NameFilter, options: &TestOptions) {
    println!("Pacebench Plan:");

    let mut total = 0;
    for suite in &plan.suites {
        let setups = suite.setup_names();
        let setups = if setups.is_empty() {
            String::new()
        } else {
            format!(" [setups: {}]", setups.join(", "))
        };
        println!(
            "├── {}{} ({}:{})",
            suite.name(),
            setups,
            suite.suite.file,
            suite.suite.line
        );

        match Tree::build(
            suite.name(),
            BuildMode::Discover,
            filter.clone(),
            options.clone(),
            |rt: &mut Runtime| suite.declare(rt),
        ) {
            Ok(tree) => {
                for &child in tree.node(tree.root()).children() {
                    total += list_node(&tree, child, 1);
                }
            }
            Err(error) => println!("│   ✗ failed to declare: {}", error),
        }
    }

    println!("{} tests found.", total);
}

fn list_node(tree: &Tree, id: NodeId, depth: usize) -> usize {
    let node = tree.node(id);
    let indent = "│   ".repeat(depth);
    match node.kind() {
        NodeKind::Describe => {
            if let Some(error) = node.error() {
                println!("{}✗ {}: {}", indent, node.name(), error);
                return 0;
            }
            if !tree.has_enabled_tests(id) {
                return 0;
            }
            println!("{}├── {}", indent, node.name());
            node.children()
                .iter()
                .map(|&child| list_node(tree, child, depth + 1))
                .sum()
        }
        NodeKind::Test if node.is_enabled() => {
            println!("{}├── {} {:?}", indent, node.name(), tree.location(id));
            1
        }
        NodeKind::Test | NodeKind::Suite => 0,
    }
}
