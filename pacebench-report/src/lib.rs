#![warn(missing_docs)]
//! Pacebench Report - Run Results
//!
//! Turns the lifecycle event stream into something people and tools read:
//! - [`ReportCollector`] folds events into a serializable [`Report`]
//! - JSON output for machines
//! - Number formatting shared with the console reporter

mod collector;
mod format;
mod json;
mod report;

pub use collector::ReportCollector;
pub use format::{
    format_bytes, format_number, format_percent, format_rate, format_result_line, format_summary,
};
pub use json::generate_json_report;
pub use report::{
    Report, ReportMeta, ReportSummary, SuiteReport, SystemInfo, TestReport, TestStatus,
};

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Live console output
    #[default]
    Human,
    /// JSON report
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "text" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}
