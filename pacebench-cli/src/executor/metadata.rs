//! System Metadata Collection
//!
//! Collects git and host details for report metadata. Git details are
//! omitted when `git` is unavailable or the directory is not a repository.

use chrono::Utc;
use pacebench_core::is_tracking;
use pacebench_ipc::{TestOptions, WorkerCapabilities};
use pacebench_report::{ReportMeta, SystemInfo};

/// Report schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Build report metadata including system info and git details
pub fn build_report_meta(options: &TestOptions, isolated: bool) -> ReportMeta {
    let host = WorkerCapabilities::detect(is_tracking());

    ReportMeta {
        schema_version: SCHEMA_VERSION,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        git_commit: git(&["rev-parse", "HEAD"]),
        git_branch: git(&["rev-parse", "--abbrev-ref", "HEAD"]),
        system: SystemInfo {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpu: host.cpu_model,
            cpu_cores: host.cpu_count,
        },
        options: options.clone(),
        isolated,
    }
}

fn git(args: &[&str]) -> Option<String> {
    std::process::Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
