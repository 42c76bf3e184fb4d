//! JSON output formatting
//!
//! Two JSON shapes leave the process:
//! - Metrics snapshot lines: one compact object per export period, appended to
//!   the metrics file (`{"status_codes":{..},"requests":n,"success":f}`)
//! - The final report: a pretty-printed document written once after the run
//!   when `--json-output` is set

use crate::config::Config;
use crate::stats::{MetricsReport, Snapshot};
use crate::util::time::format_duration;
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        Self {
            micros: u64::try_from(d.as_micros()).unwrap_or(u64::MAX),
            human: format_duration(d),
        }
    }
}

/// Latency statistics with percentiles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonLatency {
    pub total: JsonDuration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p50: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p90: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p95: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p99: Option<JsonDuration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonBytes {
    pub total: u64,
    pub mean: f64,
}

/// Ramp parameters the run was started with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRampConfig {
    pub start_freq: i64,
    pub slope_per_minute: i64,
    pub duration_minutes: i64,
    pub plateau_minutes: i64,
    pub max_workers: u64,
    pub metrics_period_secs: u64,
}

/// Final report document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub attack: String,
    pub ramp: JsonRampConfig,
    pub requests: u64,
    pub rate: f64,
    pub throughput: f64,
    pub success: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earliest: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<DateTime<Utc>>,
    pub duration: JsonDuration,
    pub wait: JsonDuration,
    pub latencies: JsonLatency,
    pub bytes_in: JsonBytes,
    pub bytes_out: JsonBytes,
    pub status_codes: BTreeMap<String, u64>,
    pub errors: Vec<String>,
}

/// Encode one snapshot as a single compact JSON line (no trailing newline)
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<String> {
    serde_json::to_string(snapshot).context("Failed to serialize metrics snapshot")
}

/// Parse one line previously produced by [`encode_snapshot`]
pub fn decode_snapshot(line: &str) -> Result<Snapshot> {
    serde_json::from_str(line.trim()).context("Invalid metrics snapshot line")
}

fn latency_to_json(report: &MetricsReport) -> JsonLatency {
    let opt = |d: Option<Duration>| d.map(JsonDuration::from_duration);
    let latency = &report.latency;
    JsonLatency {
        total: JsonDuration::from_duration(latency.total),
        mean: opt(latency.mean),
        min: opt(latency.min),
        max: opt(latency.max),
        p50: opt(latency.p50),
        p90: opt(latency.p90),
        p95: opt(latency.p95),
        p99: opt(latency.p99),
    }
}

/// Build the final report document
pub fn build_report(config: &Config, report: &MetricsReport) -> JsonReport {
    let ramp = &config.ramp;
    JsonReport {
        attack: config.attack.name.clone(),
        ramp: JsonRampConfig {
            start_freq: ramp.start_freq,
            slope_per_minute: ramp.slope_per_minute,
            duration_minutes: ramp.duration_minutes,
            plateau_minutes: ramp.plateau_minutes,
            max_workers: config.attack.max_workers,
            metrics_period_secs: config.output.metrics_period_secs,
        },
        requests: report.requests,
        rate: report.rate,
        throughput: report.throughput,
        success: report.success,
        earliest: report.earliest,
        latest: report.latest,
        duration: JsonDuration::from_duration(report.duration),
        wait: JsonDuration::from_duration(report.wait),
        latencies: latency_to_json(report),
        bytes_in: JsonBytes {
            total: report.bytes_in,
            mean: report.mean_bytes_in(),
        },
        bytes_out: JsonBytes {
            total: report.bytes_out,
            mean: report.mean_bytes_out(),
        },
        status_codes: report.status_codes.clone(),
        errors: report.errors.clone(),
    }
}

/// Write the final report to `output_path` as pretty JSON
pub fn write_json_report(output_path: &Path, report: &JsonReport) -> Result<()> {
    let file = File::create(output_path).with_context(|| {
        format!("Failed to create JSON output file: {}", output_path.display())
    })?;

    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .with_context(|| format!("Failed to write JSON report: {}", output_path.display()))?;

    Ok(())
}
