//! Report Data Structures

use chrono::{DateTime, Utc};
use pacebench_ipc::TestOptions;
use pacebench_stats::Stats;
use serde::{Deserialize, Serialize};

/// Complete run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Run metadata
    pub meta: ReportMeta,
    /// Suites in execution order
    pub suites: Vec<SuiteReport>,
    /// Errors that stopped a whole suite (declaration panics, worker setup)
    pub fatal_errors: Vec<String>,
    /// Aggregate counts
    pub summary: ReportSummary,
}

impl Report {
    /// `true` when any fatal error or test error occurred
    pub fn has_failures(&self) -> bool {
        !self.fatal_errors.is_empty()
            || self.summary.failed > 0
            || self.suites.iter().any(|s| !s.errors.is_empty())
    }
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Report schema version
    pub schema_version: u32,
    /// Pacebench version
    pub version: String,
    /// When the report was generated
    pub timestamp: DateTime<Utc>,
    /// Git commit hash
    pub git_commit: Option<String>,
    /// Git branch
    pub git_branch: Option<String>,
    /// Host information
    pub system: SystemInfo,
    /// Run-wide options (defaults, config file and CLI merged)
    pub options: TestOptions,
    /// Whether tests ran in worker processes
    pub isolated: bool,
}

/// System information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Operating system
    pub os: String,
    /// CPU architecture
    pub arch: String,
    /// CPU model
    pub cpu: String,
    /// Logical CPU count
    pub cpu_cores: u32,
}

/// One suite and the tests that ran in it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Suite name
    pub name: String,
    /// Tests in execution order
    pub tests: Vec<TestReport>,
    /// Describe and hook failures outside any test
    pub errors: Vec<String>,
}

/// Result of one test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    /// Test name
    pub name: String,
    /// Enclosing describe names, outermost first
    pub path: Vec<String>,
    /// Child indices from the suite root
    pub location: Vec<u32>,
    /// Passed or failed
    pub status: TestStatus,
    /// Merged duration statistics (ms per iteration)
    pub duration: Stats,
    /// Merged memory statistics (bytes per iteration)
    pub memory: Stats,
    /// Error messages, in order
    pub errors: Vec<String>,
}

/// Test outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// No error was reported
    Passed,
    /// At least one error was reported
    Failed,
}

/// Report summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Suites run
    pub suites: usize,
    /// Tests run
    pub tests: usize,
    /// Tests without errors
    pub passed: usize,
    /// Tests with errors
    pub failed: usize,
    /// Fatal errors
    pub fatal_errors: usize,
    /// Wall-clock time of the run
    pub total_duration_ms: f64,
}
