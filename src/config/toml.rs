//! TOML configuration file parsing
//!
//! ```toml
//! [ramp]
//! start_freq = 5
//! slope_per_minute = 5
//! duration_minutes = 10
//! plateau_minutes = 5
//!
//! [attack]
//! targets = "targets.jsonl"
//! max_workers = 50
//! headers = ["Authorization: Bearer abc"]
//!
//! [output]
//! metrics_file = "metrics.jsonl"
//! metrics_period_secs = 1
//! ```

use super::cli::Cli;
use super::cli_convert::parse_duration;
use super::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents).context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    if let Some(start) = cli.start {
        config.ramp.start_freq = start;
    }
    if let Some(slope) = cli.slope_pm {
        config.ramp.slope_per_minute = slope;
    }
    if let Some(minutes) = cli.dur_in_min {
        config.ramp.duration_minutes = minutes;
    }
    if let Some(minutes) = cli.plat_dur {
        config.ramp.plateau_minutes = minutes;
    }

    if let Some(targets) = &cli.targets {
        config.attack.targets = Some(targets.clone());
    }
    if let Some(max_workers) = cli.max_workers {
        config.attack.max_workers = max_workers;
    }
    if let Some(timeout) = &cli.timeout {
        config.attack.timeout_secs = parse_duration(timeout)?;
    }
    if let Some(name) = &cli.name {
        config.attack.name = name.clone();
    }
    if let Some(body) = &cli.body {
        config.attack.body = Some(body.clone());
    }
    // CLI headers add to the file's
    config.attack.headers.extend(cli.headers.iter().cloned());

    if let Some(metrics_file) = &cli.metrics_file {
        config.output.metrics_file = Some(metrics_file.clone());
    }
    if let Some(period) = cli.metrics_period {
        config.output.metrics_period_secs = period;
    }
    if cli.no_final_flush {
        config.output.final_flush = false;
    }
    if let Some(json) = &cli.json_output {
        config.output.json_output = Some(json.clone());
    }

    config.runtime.dry_run |= cli.dry_run;
    config.runtime.debug |= cli.debug;

    Ok(config)
}
