//! Event Collection
//!
//! Folds a lifecycle event stream (in-process or forwarded from workers)
//! into a [`Report`].

use crate::report::{Report, ReportMeta, ReportSummary, SuiteReport, TestReport, TestStatus};
use pacebench_ipc::{EventSink, LifecycleEvent};
use std::time::Instant;

/// Builds a [`Report`] from lifecycle events
#[derive(Debug)]
pub struct ReportCollector {
    suites: Vec<SuiteReport>,
    fatal_errors: Vec<String>,
    describes: Vec<String>,
    current: Option<TestReport>,
    started: Instant,
}

impl Default for ReportCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportCollector {
    /// Start collecting; the run duration is measured from here
    pub fn new() -> Self {
        Self {
            suites: Vec::new(),
            fatal_errors: Vec::new(),
            describes: Vec::new(),
            current: None,
            started: Instant::now(),
        }
    }

    /// Finish the run and produce the report
    pub fn finish(mut self, meta: ReportMeta) -> Report {
        // A test whose worker vanished without TestEnd still counts
        if let Some(test) = self.current.take() {
            self.push_test(test);
        }

        let tests = self.suites.iter().flat_map(|s| s.tests.iter());
        let (passed, failed) = tests.fold((0, 0), |(p, f), t| match t.status {
            TestStatus::Passed => (p + 1, f),
            TestStatus::Failed => (p, f + 1),
        });
        let summary = ReportSummary {
            suites: self.suites.len(),
            tests: passed + failed,
            passed,
            failed,
            fatal_errors: self.fatal_errors.len(),
            total_duration_ms: self.started.elapsed().as_secs_f64() * 1e3,
        };

        Report {
            meta,
            suites: self.suites,
            fatal_errors: self.fatal_errors,
            summary,
        }
    }

    fn suite_mut(&mut self) -> &mut SuiteReport {
        if self.suites.is_empty() {
            self.suites.push(SuiteReport::default());
        }
        let last = self.suites.len() - 1;
        &mut self.suites[last]
    }

    fn push_test(&mut self, mut test: TestReport) {
        if !test.errors.is_empty() {
            test.status = TestStatus::Failed;
        }
        self.suite_mut().tests.push(test);
    }

    fn record_error(&mut self, message: String) {
        match self.current.as_mut() {
            Some(test) => test.errors.push(message),
            None => self.suite_mut().errors.push(message),
        }
    }
}

impl EventSink for ReportCollector {
    fn emit(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::SuiteStart { name } => {
                self.describes.clear();
                self.suites.push(SuiteReport {
                    name,
                    ..SuiteReport::default()
                });
            }
            LifecycleEvent::DescribeStart { name } => self.describes.push(name),
            LifecycleEvent::DescribeEnd { .. } => {
                self.describes.pop();
            }
            LifecycleEvent::TestStart { name, location } => {
                if let Some(previous) = self.current.take() {
                    self.push_test(previous);
                }
                self.current = Some(TestReport {
                    name,
                    path: self.describes.clone(),
                    location,
                    status: TestStatus::Passed,
                    duration: Default::default(),
                    memory: Default::default(),
                    errors: Vec::new(),
                });
            }
            LifecycleEvent::TestEnd {
                name,
                duration,
                memory,
            } => {
                let mut test = self.current.take().unwrap_or_else(|| TestReport {
                    name,
                    path: self.describes.clone(),
                    location: Vec::new(),
                    status: TestStatus::Passed,
                    duration: Default::default(),
                    memory: Default::default(),
                    errors: Vec::new(),
                });
                test.duration = duration;
                test.memory = memory;
                self.push_test(test);
            }
            LifecycleEvent::MeasureError { message } | LifecycleEvent::Error { message } => {
                self.record_error(message)
            }
            LifecycleEvent::FatalError { message } => self.fatal_errors.push(message),
            LifecycleEvent::SuiteEnd { .. }
            | LifecycleEvent::MeasureWarmupStart
            | LifecycleEvent::MeasureWarmupEnd
            | LifecycleEvent::MeasureStart
            | LifecycleEvent::MeasureProgress { .. }
            | LifecycleEvent::MeasureEnd { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::SystemInfo;
    use pacebench_ipc::TestOptions;
    use pacebench_stats::Histogram;

    fn meta() -> ReportMeta {
        ReportMeta {
            schema_version: 1,
            version: "test".to_string(),
            timestamp: chrono::Utc::now(),
            git_commit: None,
            git_branch: None,
            system: SystemInfo {
                os: "linux".to_string(),
                arch: "x86_64".to_string(),
                cpu: "cpu".to_string(),
                cpu_cores: 1,
            },
            options: TestOptions::default(),
            isolated: false,
        }
    }

    fn stats(samples: &[f64]) -> pacebench_stats::Stats {
        let mut h = Histogram::new();
        for &s in samples {
            h.add(s);
        }
        h.stats()
    }

    fn ev_suite(name: &str) -> LifecycleEvent {
        LifecycleEvent::SuiteStart {
            name: name.to_string(),
        }
    }

    fn ev_describe(name: &str) -> LifecycleEvent {
        LifecycleEvent::DescribeStart {
            name: name.to_string(),
        }
    }

    fn ev_start(name: &str, location: Vec<u32>) -> LifecycleEvent {
        LifecycleEvent::TestStart {
            name: name.to_string(),
            location,
        }
    }

    fn ev_end(name: &str, samples: &[f64]) -> LifecycleEvent {
        LifecycleEvent::TestEnd {
            name: name.to_string(),
            duration: stats(samples),
            memory: Default::default(),
        }
    }

    #[test]
    fn test_collects_tests_with_describe_path() {
        let mut collector = ReportCollector::new();
        for event in [
            ev_suite("parsing"),
            ev_describe("json"),
            ev_start("small", vec![0, 0]),
            LifecycleEvent::MeasureProgress { percent: 0.5 },
            ev_end("small", &[1.0, 2.0, 3.0]),
            LifecycleEvent::DescribeEnd {
                name: "json".to_string(),
            },
            ev_start("top", vec![1]),
            ev_end("top", &[4.0]),
            LifecycleEvent::SuiteEnd {
                name: "parsing".to_string(),
            },
        ] {
            collector.emit(event);
        }

        let report = collector.finish(meta());
        assert_eq!(report.suites.len(), 1);
        let tests = &report.suites[0].tests;
        assert_eq!(tests[0].path, vec!["json"]);
        assert_eq!(tests[0].location, vec![0, 0]);
        assert_eq!(tests[0].duration.size, 3);
        assert!(tests[1].path.is_empty());
        assert_eq!(report.summary.tests, 2);
        assert_eq!(report.summary.passed, 2);
        assert!(!report.has_failures());
    }

    #[test]
    fn test_errors_mark_test_failed() {
        let mut collector = ReportCollector::new();
        collector.emit(ev_suite("s"));
        collector.emit(ev_start("t", vec![0]));
        collector.emit(LifecycleEvent::MeasureError {
            message: "boom".to_string(),
        });
        collector.emit(ev_end("t", &[]));

        let report = collector.finish(meta());
        assert_eq!(report.suites[0].tests[0].status, TestStatus::Failed);
        assert_eq!(report.suites[0].tests[0].errors, vec!["boom"]);
        assert_eq!(report.summary.failed, 1);
        assert!(report.has_failures());
    }

    #[test]
    fn test_describe_errors_and_fatal_errors() {
        let mut collector = ReportCollector::new();
        collector.emit(LifecycleEvent::FatalError {
            message: "suite `a` failed to declare: nope".to_string(),
        });
        collector.emit(ev_suite("b"));
        collector.emit(ev_describe("broken"));
        collector.emit(LifecycleEvent::Error {
            message: "describe failed".to_string(),
        });

        let report = collector.finish(meta());
        assert_eq!(report.fatal_errors.len(), 1);
        assert_eq!(report.summary.fatal_errors, 1);
        assert_eq!(report.suites[0].errors, vec!["describe failed"]);
        assert_eq!(report.summary.tests, 0);
        assert!(report.has_failures());
    }

    #[test]
    fn test_unterminated_test_is_kept() {
        let mut collector = ReportCollector::new();
        collector.emit(ev_suite("s"));
        collector.emit(ev_start("t", vec![0]));
        collector.emit(LifecycleEvent::Error {
            message: "worker crashed".to_string(),
        });

        let report = collector.finish(meta());
        assert_eq!(report.suites[0].tests.len(), 1);
        assert_eq!(report.summary.failed, 1);
    }

    #[test]
    fn test_report_serializes() {
        let mut collector = ReportCollector::new();
        collector.emit(ev_suite("s"));
        collector.emit(ev_start("t", vec![0]));
        collector.emit(ev_end("t", &[2.0]));
        let report = collector.finish(meta());

        let json = crate::generate_json_report(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["suites"][0]["tests"][0]["status"], "passed");
        assert_eq!(value["suites"][0]["tests"][0]["duration"]["hz"], 500.0);
    }
}
