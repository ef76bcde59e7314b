//! Configuration loading from pace.toml
//!
//! Pacebench configuration can be specified in a `pace.toml` file in the
//! project root. The file is discovered by walking up from the current
//! directory unless `--config` names one explicitly.

use pacebench_ipc::TestOptions;
use pacebench_report::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file name searched for during discovery
pub const CONFIG_FILE_NAME: &str = "pace.toml";

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The file is not valid TOML or has unknown keys
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        source: toml::de::Error,
    },

    /// A duration string could not be parsed
    #[error("invalid duration `{0}`: expected e.g. \"60s\", \"500ms\" or \"2m\"")]
    InvalidDuration(String),

    /// An option value is out of range
    #[error("invalid option: {0}")]
    InvalidOption(String),
}

/// Pacebench configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaceConfig {
    /// Suite name patterns to run (all suites when empty)
    #[serde(default)]
    pub include: Vec<String>,
    /// Setup name patterns to apply (all setups when empty)
    #[serde(default)]
    pub setup: Vec<String>,
    /// Test name patterns (every test when empty)
    #[serde(default)]
    pub filter: Vec<String>,
    /// Run-wide measurement options
    #[serde(default)]
    pub options: TestOptions,
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Runner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    /// Run each test in its own worker process
    #[serde(default = "default_isolated")]
    pub isolated: bool,
    /// Time allowed for a single worker (e.g. "60s", "5m")
    #[serde(default = "default_worker_timeout")]
    pub worker_timeout: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            isolated: default_isolated(),
            worker_timeout: default_worker_timeout(),
        }
    }
}

fn default_isolated() -> bool {
    true
}
fn default_worker_timeout() -> String {
    "60s".to_string()
}

/// Output configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Report format
    #[serde(default)]
    pub format: OutputFormat,
    /// Report file (stdout if not specified)
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl PaceConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Discover configuration by walking up from the current directory
    pub fn discover() -> Result<Option<(PathBuf, Self)>, ConfigError> {
        match std::env::current_dir() {
            Ok(dir) => Self::discover_from(&dir),
            Err(_) => Ok(None),
        }
    }

    /// Discover configuration by walking up from `start`
    pub fn discover_from(start: &Path) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let mut dir = start.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.is_file() {
                let config = Self::load(&config_path)?;
                return Ok(Some((config_path, config)));
            }
            if !dir.pop() {
                return Ok(None);
            }
        }
    }

    /// Worker timeout as a duration
    pub fn worker_timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.runner.worker_timeout)
    }
}

/// Parse a duration string (e.g. "3s", "500ms", "2m"). A bare number is
/// seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(s.to_string());
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let (num_part, unit_part) = trimmed
        .char_indices()
        .find(|(_, c)| c.is_alphabetic())
        .map(|(i, _)| trimmed.split_at(i))
        .unwrap_or((trimmed, "s"));

    let value: f64 = num_part.trim().parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }

    let seconds = match unit_part.trim().to_lowercase().as_str() {
        "ns" => value / 1e9,
        "us" | "µs" => value / 1e6,
        "ms" => value / 1e3,
        "s" | "" => value,
        "m" | "min" => value * 60.0,
        _ => return Err(invalid()),
    };
    Ok(Duration::from_secs_f64(seconds))
}

/// Reject run-wide option values the engine cannot work with
pub fn validate_options(options: &TestOptions) -> Result<(), ConfigError> {
    options.validate().map_err(ConfigError::InvalidOption)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PaceConfig::default();
        assert!(config.runner.isolated);
        assert_eq!(config.worker_timeout().unwrap(), Duration::from_secs(60));
        assert_eq!(config.output.format, OutputFormat::Human);
        assert!(config.options.is_empty());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("100us").unwrap(), Duration::from_micros(100));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("3 parsecs").is_err());
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            include = ["parsing"]
            filter = ["json"]

            [options]
            measure_timeout = 2000.0
            target_rme = 0.01

            [runner]
            isolated = false
            worker_timeout = "5m"

            [output]
            format = "json"
            path = "target/pace.json"
        "#;

        let config: PaceConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.include, vec!["parsing"]);
        assert!(config.setup.is_empty());
        assert_eq!(config.options.measure_timeout, Some(2000.0));
        assert_eq!(config.options.warmup_iteration_count, None);
        assert!(!config.runner.isolated);
        assert_eq!(config.worker_timeout().unwrap(), Duration::from_secs(300));
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.output.path, Some(PathBuf::from("target/pace.json")));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(toml::from_str::<PaceConfig>("jobs = 4").is_err());
        assert!(toml::from_str::<PaceConfig>("[runner]\njobs = 4").is_err());
        assert!(toml::from_str::<PaceConfig>("[options]\nwarmup = 4").is_err());
    }

    #[test]
    fn test_discover_walks_up() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            root.path().join(CONFIG_FILE_NAME),
            "[runner]\nisolated = false\n",
        )
        .unwrap();

        let (path, config) = PaceConfig::discover_from(&nested).unwrap().unwrap();
        assert_eq!(path, root.path().join(CONFIG_FILE_NAME));
        assert!(!config.runner.isolated);
    }

    #[test]
    fn test_discover_reports_parse_errors() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join(CONFIG_FILE_NAME), "bogus = true\n").unwrap();

        let error = PaceConfig::discover_from(root.path()).unwrap_err();
        assert!(matches!(error, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validate_options() {
        assert!(validate_options(&TestOptions::new().with_target_rme(0.05)).is_ok());
        assert!(validate_options(&TestOptions::new().with_target_rme(1.5)).is_err());
        assert!(validate_options(&TestOptions::new().with_measure_timeout(0.0)).is_err());
    }
}
