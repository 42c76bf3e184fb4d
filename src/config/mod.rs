//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ramp: RampConfig,
    #[serde(default)]
    pub attack: AttackConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Staircase ramp parameters
///
/// Rates are not range-checked: a zero or negative rate yields phases that
/// issue no requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RampConfig {
    /// Requests per second in the first phase
    #[serde(default = "default_start_freq")]
    pub start_freq: i64,
    /// Rate increase per minute
    #[serde(default = "default_slope")]
    pub slope_per_minute: i64,
    /// Number of ramp phases (one per minute)
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: i64,
    /// Extra minutes the final rate is held for
    #[serde(default = "default_plateau_minutes")]
    pub plateau_minutes: i64,
}

fn default_start_freq() -> i64 {
    1
}

fn default_slope() -> i64 {
    1
}

fn default_duration_minutes() -> i64 {
    2
}

fn default_plateau_minutes() -> i64 {
    1
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            start_freq: default_start_freq(),
            slope_per_minute: default_slope(),
            duration_minutes: default_duration_minutes(),
            plateau_minutes: default_plateau_minutes(),
        }
    }
}

/// What to attack and how hard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackConfig {
    /// Line-delimited JSON targets file
    pub targets: Option<PathBuf>,
    /// Attack label carried by every result
    #[serde(default = "default_name")]
    pub name: String,
    /// Maximum requests in flight at once
    #[serde(default = "default_max_workers")]
    pub max_workers: u64,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// File whose contents are the default request body
    pub body: Option<PathBuf>,
    /// Default headers, each as `Name: value`
    #[serde(default)]
    pub headers: Vec<String>,
}

fn default_name() -> String {
    "stairload".to_string()
}

fn default_max_workers() -> u64 {
    10
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            targets: None,
            name: default_name(),
            max_workers: default_max_workers(),
            timeout_secs: default_timeout_secs(),
            body: None,
            headers: Vec::new(),
        }
    }
}

impl AttackConfig {
    /// Engine tuning derived from the attack settings
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_workers: self.max_workers,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Where results go
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Snapshot file (truncated when opened)
    pub metrics_file: Option<PathBuf>,
    /// Seconds between snapshots
    #[serde(default = "default_metrics_period")]
    pub metrics_period_secs: u64,
    /// Write one last snapshot when the run ends
    #[serde(default = "default_final_flush")]
    pub final_flush: bool,
    /// Final report as JSON
    pub json_output: Option<PathBuf>,
}

fn default_metrics_period() -> u64 {
    2
}

fn default_final_flush() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            metrics_file: None,
            metrics_period_secs: default_metrics_period(),
            final_flush: default_final_flush(),
            json_output: None,
        }
    }
}

impl OutputConfig {
    pub fn metrics_period(&self) -> Duration {
        Duration::from_secs(self.metrics_period_secs)
    }
}

/// Runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Print the plan and exit without attacking
    #[serde(default)]
    pub dry_run: bool,
    /// Verbose diagnostics
    #[serde(default)]
    pub debug: bool,
}

impl RuntimeConfig {
    /// Default log filter when `RUST_LOG` is unset
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Ramp: {}", self.ramp)?;
        writeln!(f, "  Attack: {}", self.attack)?;
        writeln!(f, "  Output: {}", self.output)?;
        Ok(())
    }
}

impl fmt::Display for RampConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "start={}/s, slope={}/s per minute, duration={}m, plateau={}m",
            self.start_freq, self.slope_per_minute, self.duration_minutes, self.plateau_minutes
        )
    }
}

impl fmt::Display for AttackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.targets {
            Some(path) => write!(f, "{}", path.display())?,
            None => write!(f, "<no targets>")?,
        }
        write!(
            f,
            ", name={}, max_workers={}, timeout={}s",
            self.name, self.max_workers, self.timeout_secs
        )?;
        if let Some(body) = &self.body {
            write!(f, ", body={}", body.display())?;
        }
        if !self.headers.is_empty() {
            write!(f, ", headers={}", self.headers.len())?;
        }
        Ok(())
    }
}

impl fmt::Display for OutputConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.metrics_file {
            Some(path) => write!(f, "metrics={}", path.display())?,
            None => write!(f, "metrics=<none>")?,
        }
        write!(f, " every {}s", self.metrics_period_secs)?;
        if !self.final_flush {
            write!(f, " (no final flush)")?;
        }
        if let Some(json) = &self.json_output {
            write!(f, ", json={}", json.display())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.ramp.start_freq, 1);
        assert_eq!(config.ramp.slope_per_minute, 1);
        assert_eq!(config.ramp.duration_minutes, 2);
        assert_eq!(config.ramp.plateau_minutes, 1);
        assert_eq!(config.attack.max_workers, 10);
        assert_eq!(config.attack.name, "stairload");
        assert_eq!(config.output.metrics_period_secs, 2);
        assert!(config.output.final_flush);
        assert!(!config.runtime.dry_run);
        assert_eq!(config.runtime.log_level(), "info");
    }

    #[test]
    fn test_log_level_follows_debug() {
        let runtime = RuntimeConfig {
            debug: true,
            ..Default::default()
        };
        assert_eq!(runtime.log_level(), "debug");
    }

    #[test]
    fn test_engine_config() {
        let attack = AttackConfig {
            max_workers: 4,
            timeout_secs: 5,
            ..Default::default()
        };
        let engine = attack.engine_config();
        assert_eq!(engine.max_workers, 4);
        assert_eq!(engine.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_display() {
        let mut config = Config::default();
        config.attack.targets = Some(PathBuf::from("targets.jsonl"));
        config.output.metrics_file = Some(PathBuf::from("metrics.jsonl"));

        let text = config.to_string();
        assert!(text.contains("start=1/s"));
        assert!(text.contains("targets.jsonl"));
        assert!(text.contains("metrics=metrics.jsonl every 2s"));
    }
}
