//! Number Formatting
//!
//! Shared by the live console reporter and the end-of-run summary.

use crate::report::{Report, TestStatus};
use pacebench_stats::Stats;

/// Two decimals with thousands separators: `1234567.891` -> `1,234,567.89`
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed.bytes().any(|b| b != b'0' && b != b'.') {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{frac_part}")
}

/// Operations per second
pub fn format_rate(hz: f64) -> String {
    format!("{} ops/sec", format_number(hz))
}

/// A fraction as a percentage: `0.005` -> `0.50%`
pub fn format_percent(fraction: f64) -> String {
    format!("{}%", format_number(fraction * 100.0))
}

/// Byte counts with binary units: `12595.2` -> `12.3 KiB`
pub fn format_bytes(bytes: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut value = bytes;
    let mut unit = 0;
    while value.abs() >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{:.0} {}", value, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// One result line: `name  1,234.56 ops/sec ± 0.50% (42 samples)`, with
/// `  ~12.3 KiB/op` appended when memory was sampled
pub fn format_result_line(name: &str, duration: &Stats, memory: &Stats) -> String {
    let mut line = format!(
        "{}  {} ± {} ({} {})",
        name,
        format_rate(duration.hz),
        format_percent(duration.rme),
        duration.size,
        if duration.size == 1 { "sample" } else { "samples" },
    );
    if !memory.is_empty() {
        line.push_str(&format!("  ~{}/op", format_bytes(memory.mean)));
    }
    line
}

/// End-of-run summary for the terminal
pub fn format_summary(report: &Report) -> String {
    let mut output = String::new();

    for error in &report.fatal_errors {
        output.push_str(&format!("fatal: {}\n", error));
    }

    let failed: Vec<_> = report
        .suites
        .iter()
        .flat_map(|suite| {
            suite
                .tests
                .iter()
                .filter(|t| t.status == TestStatus::Failed)
                .map(move |t| (suite.name.as_str(), t))
        })
        .collect();
    if !failed.is_empty() {
        output.push_str("\nFailed tests:\n");
        for (suite, test) in failed {
            let mut path = vec![suite];
            path.extend(test.path.iter().map(String::as_str));
            path.push(&test.name);
            output.push_str(&format!("  ✗ {}\n", path.join(" › ")));
            for error in &test.errors {
                output.push_str(&format!("      {}\n", error));
            }
        }
    }

    let s = &report.summary;
    output.push_str(&format!(
        "\n{} tests: {} passed, {} failed, {} fatal errors ({:.2}s)\n",
        s.tests,
        s.passed,
        s.failed,
        s.fatal_errors,
        s.total_duration_ms / 1e3
    ));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use pacebench_stats::Histogram;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0.0), "0.00");
        assert_eq!(format_number(12.345), "12.35");
        assert_eq!(format_number(1234.5), "1,234.50");
        assert_eq!(format_number(1234567.891), "1,234,567.89");
        assert_eq!(format_number(-98765.4), "-98,765.40");
        assert_eq!(format_number(-0.001), "0.00");
        assert_eq!(format_number(999.999), "1,000.00");
    }

    #[test]
    fn test_format_percent_and_rate() {
        assert_eq!(format_percent(0.005), "0.50%");
        assert_eq!(format_rate(1500.0), "1,500.00 ops/sec");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512.0), "512 B");
        assert_eq!(format_bytes(12595.2), "12.3 KiB");
        assert_eq!(format_bytes(3.0 * 1024.0 * 1024.0), "3.0 MiB");
    }

    #[test]
    fn test_result_line() {
        let mut duration = Histogram::new();
        duration.add(2.0);
        duration.add(2.0);
        let line = format_result_line("parse", &duration.stats(), &Stats::default());
        assert_eq!(line, "parse  500.00 ops/sec ± 0.00% (2 samples)");

        let mut memory = Histogram::new();
        memory.add(2048.0);
        let line = format_result_line("parse", &duration.stats(), &memory.stats());
        assert!(line.ends_with("  ~2.0 KiB/op"));
    }
}
