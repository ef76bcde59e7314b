//! Live Console Output
//!
//! Prints suites and describes as they are entered, a progress bar while a
//! test measures, and one result line per finished test.

use indicatif::{ProgressBar, ProgressStyle};
use pacebench_ipc::{EventSink, LifecycleEvent};
use pacebench_report::format_result_line;
use std::io::Write;

const BAR_LENGTH: u64 = 1000;

/// Console reporter fed by lifecycle events
pub struct ConsoleReporter<W: Write> {
    out: W,
    show_progress: bool,
    depth: usize,
    bar: Option<ProgressBar>,
    errors: Vec<String>,
    in_test: bool,
}

impl<W: Write> ConsoleReporter<W> {
    /// Reporter writing result lines to `out`; progress bars go to stderr
    /// when `show_progress` is set
    pub fn new(out: W, show_progress: bool) -> Self {
        Self {
            out,
            show_progress,
            depth: 0,
            bar: None,
            errors: Vec::new(),
            in_test: false,
        }
    }

    /// Give back the writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        let indent = "  ".repeat(self.depth);
        let out = &mut self.out;
        let mut write = || {
            let _ = writeln!(out, "{indent}{text}");
        };
        match &self.bar {
            Some(bar) => bar.suspend(write),
            None => write(),
        }
    }

    fn start_bar(&mut self, name: &str) {
        if !self.show_progress {
            return;
        }
        let bar = ProgressBar::new(BAR_LENGTH);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix}{msg} [{bar:30.cyan/blue}] {percent:>3}% {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_prefix("  ".repeat(self.depth));
        bar.set_message(name.to_string());
        self.bar = Some(bar);
    }

    fn finish_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl<W: Write> EventSink for ConsoleReporter<W> {
    fn emit(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::SuiteStart { name } => {
                self.depth = 0;
                self.line(&name);
                self.depth = 1;
            }
            LifecycleEvent::SuiteEnd { .. } => {
                self.depth = 0;
                self.line("");
            }
            LifecycleEvent::DescribeStart { name } => {
                self.line(&name);
                self.depth += 1;
            }
            LifecycleEvent::DescribeEnd { .. } => {
                self.depth = self.depth.saturating_sub(1);
            }
            LifecycleEvent::TestStart { name, .. } => {
                self.errors.clear();
                self.in_test = true;
                self.start_bar(&name);
            }
            LifecycleEvent::MeasureProgress { percent } => {
                if let Some(bar) = &self.bar {
                    bar.set_position((percent.clamp(0.0, 1.0) * BAR_LENGTH as f64) as u64);
                }
            }
            LifecycleEvent::MeasureError { message } | LifecycleEvent::Error { message } => {
                if self.in_test {
                    self.errors.push(message);
                } else {
                    self.line(&format!("✗ {message}"));
                }
            }
            LifecycleEvent::TestEnd {
                name,
                duration,
                memory,
            } => {
                self.finish_bar();
                self.in_test = false;
                if duration.is_empty() {
                    self.line(&format!("✗ {name}"));
                } else {
                    self.line(&format_result_line(&name, &duration, &memory));
                }
                self.depth += 2;
                for error in std::mem::take(&mut self.errors) {
                    self.line(&error);
                }
                self.depth -= 2;
            }
            LifecycleEvent::FatalError { message } => {
                self.finish_bar();
                let depth = std::mem::replace(&mut self.depth, 0);
                self.line(&format!("fatal: {message}"));
                self.depth = depth;
            }
            LifecycleEvent::MeasureWarmupStart
            | LifecycleEvent::MeasureWarmupEnd
            | LifecycleEvent::MeasureStart
            | LifecycleEvent::MeasureEnd { .. } => {}
        }
    }
}
