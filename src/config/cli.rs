//! CLI argument parsing using clap

use clap::Parser;
use std::path::PathBuf;

/// stairload - staircase ramp-up HTTP load generator
///
/// Numeric options left unset fall back to the config file (if any), then to
/// the built-in defaults.
#[derive(Parser, Debug, Default)]
#[command(name = "stairload")]
#[command(version, about, long_about = None)]
pub struct Cli {
    // === Inputs and outputs ===
    /// Targets file (line-delimited JSON)
    #[arg(long, visible_alias = "tf", value_name = "PATH")]
    pub targets: Option<PathBuf>,

    /// Metrics snapshot file (truncated upon reuse)
    #[arg(long, visible_alias = "mf", value_name = "PATH")]
    pub metrics_file: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // === Ramp ===
    /// Requests per second in the first phase [default: 1]
    #[arg(long, allow_hyphen_values = true)]
    pub start: Option<i64>,

    /// Rate increase per minute [default: 1]
    #[arg(long, visible_alias = "slope_pm", allow_hyphen_values = true)]
    pub slope_pm: Option<i64>,

    /// Ramp duration in minutes [default: 2]
    #[arg(long, visible_alias = "dur_in_min", allow_hyphen_values = true)]
    pub dur_in_min: Option<i64>,

    /// Plateau duration in minutes [default: 1]
    #[arg(long, visible_alias = "plat_dur", allow_hyphen_values = true)]
    pub plat_dur: Option<i64>,

    /// Seconds between metrics snapshots [default: 2]
    #[arg(long, visible_alias = "metrics_period")]
    pub metrics_period: Option<u64>,

    /// Maximum requests in flight [default: 10]
    #[arg(long, visible_alias = "max_workers")]
    pub max_workers: Option<u64>,

    // === Requests ===
    /// Default request body, read from a file
    #[arg(long, value_name = "PATH")]
    pub body: Option<PathBuf>,

    /// Default request header, "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,

    /// Per-request timeout (e.g., 30s, 1m) [default: 30s]
    #[arg(long)]
    pub timeout: Option<String>,

    /// Attack label [default: stairload]
    #[arg(long)]
    pub name: Option<String>,

    // === Output and control ===
    /// Write the final report as JSON to this file
    #[arg(long, value_name = "PATH")]
    pub json_output: Option<PathBuf>,

    /// Do not write a last snapshot when the run ends
    #[arg(long)]
    pub no_final_flush: bool,

    /// Print the ramp plan and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    ///
    /// Only catches what is wrong regardless of the config file; the merged
    /// configuration is validated again by [`super::validator::validate_config`].
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.targets.is_none() && self.config.is_none() {
            anyhow::bail!("--targets is required (or provide it through --config)");
        }

        if self.metrics_period == Some(0) {
            anyhow::bail!("metrics_period must be at least 1 second");
        }

        if self.max_workers == Some(0) {
            anyhow::bail!("max_workers must be at least 1");
        }

        if let Some(minutes) = self.dur_in_min {
            if minutes < 1 {
                anyhow::bail!("dur_in_min must be at least 1, got {}", minutes);
            }
        }

        if let Some(minutes) = self.plat_dur {
            if minutes < 0 {
                anyhow::bail!("plat_dur must not be negative, got {}", minutes);
            }
        }

        for header in &self.headers {
            super::cli_convert::parse_header(header)?;
        }

        if let Some(timeout) = &self.timeout {
            super::cli_convert::parse_duration(timeout)?;
        }

        Ok(())
    }
}
