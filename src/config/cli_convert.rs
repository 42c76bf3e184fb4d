//! CLI to Config conversion utilities

use crate::config::cli::Cli;
use crate::config::{AttackConfig, Config};
use crate::target::{Header, TargetDefaults};
use anyhow::{Context, Result};
use std::fs;

/// Parse a duration string (e.g., "60s", "5m", "1h") to seconds
pub fn parse_duration(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if s.ends_with("sec") || s.ends_with('s') {
        (s.trim_end_matches("sec").trim_end_matches('s'), 1u64)
    } else if s.ends_with("min") || s.ends_with('m') {
        (s.trim_end_matches("min").trim_end_matches('m'), 60)
    } else if s.ends_with("hr") || s.ends_with('h') {
        (s.trim_end_matches("hr").trim_end_matches('h'), 3600)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .parse()
        .with_context(|| format!("Invalid duration format: {}", s))?;

    num.checked_mul(multiplier)
        .with_context(|| format!("Duration too large: {}", s))
}

/// Parse a `Name: value` header
pub fn parse_header(s: &str) -> Result<(String, String)> {
    let (name, value) = s
        .split_once(':')
        .with_context(|| format!("Invalid header (expected \"Name: value\"): {}", s))?;

    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Invalid header (empty name): {}", s);
    }

    Ok((name.to_string(), value.trim().to_string()))
}

/// Collect `Name: value` headers into a header map, keeping repeat order
pub fn parse_headers(headers: &[String]) -> Result<Header> {
    let mut map = Header::new();
    for header in headers {
        let (name, value) = parse_header(header)?;
        map.entry(name).or_default().push(value);
    }
    Ok(map)
}

/// Load the default body and headers applied to every target
pub fn build_target_defaults(attack: &AttackConfig) -> Result<TargetDefaults> {
    let body = match &attack.body {
        Some(path) => fs::read(path)
            .with_context(|| format!("Failed to read body file: {}", path.display()))?,
        None => Vec::new(),
    };

    Ok(TargetDefaults {
        body,
        header: parse_headers(&attack.headers)?,
    })
}

/// Build a configuration from CLI arguments alone
pub fn cli_to_config(cli: &Cli) -> Result<Config> {
    super::toml::merge_cli_with_config(cli, Config::default())
}
