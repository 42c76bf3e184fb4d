//! Human-readable text output
//!
//! Everything here renders into a `String` first so it can be tested; the
//! `print_*` wrappers write the rendered text to stdout.

use crate::config::Config;
use crate::driver::RunSummary;
use crate::schedule::RatePlan;
use crate::stats::MetricsReport;
use crate::target::TargetError;
use crate::util::time::{format_bytes, format_duration, format_minutes, format_rate};
use std::fmt::Write;
use std::time::Duration;

/// Errors listed individually before the rest are summarized
pub const MAX_DISPLAYED_ERRORS: usize = 10;

const RULE: &str = "═══════════════════════════════════════════════════════════";

pub fn print_configuration(config: &Config) {
    print!("{}", config);
    println!();
}

/// Render the ramp plan as a table
pub fn render_plan(plan: &RatePlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Ramp plan ({} phases, {}):", plan.len(), format_minutes(plan.total_duration()));
    for phase in plan {
        let _ = writeln!(
            out,
            "  phase {:>3}: {:>6} req/s for {}",
            phase.index,
            phase.frequency,
            format_minutes(phase.duration)
        );
    }
    let _ = writeln!(out, "  expected requests: {}", format_number(plan.expected_requests()));
    out
}

pub fn print_plan(plan: &RatePlan) {
    print!("{}", render_plan(plan));
    println!();
}

/// Render per-line target errors, capped like the final error list
pub fn render_target_errors(errors: &[TargetError]) -> String {
    let mut out = String::new();
    if errors.is_empty() {
        return out;
    }
    let _ = writeln!(out, "Skipped {} invalid target line(s):", errors.len());
    for error in errors.iter().take(MAX_DISPLAYED_ERRORS) {
        let _ = writeln!(out, "  {}", error);
    }
    if errors.len() > MAX_DISPLAYED_ERRORS {
        let _ = writeln!(out, "  ... and {} more", errors.len() - MAX_DISPLAYED_ERRORS);
    }
    out
}

pub fn print_target_errors(errors: &[TargetError]) {
    print!("{}", render_target_errors(errors));
}

fn opt_duration(d: Option<Duration>) -> String {
    d.map(format_duration).unwrap_or_else(|| "-".to_string())
}

/// Render the final report
///
/// Errors come last: the first [`MAX_DISPLAYED_ERRORS`] distinct messages,
/// then the total count.
pub fn render_results(report: &MetricsReport, summary: Option<&RunSummary>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "                    ATTACK RESULTS");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out);

    if let Some(summary) = summary {
        let _ = writeln!(out, "Elapsed Time: {:.3}s", summary.elapsed.as_secs_f64());
        let _ = writeln!(out);
        let _ = writeln!(out, "Phases:");
        for phase in &summary.phases {
            let _ = writeln!(
                out,
                "  phase {:>3}: {:>8} for {:>6} -> {} results in {:.1}s",
                phase.index,
                phase.rate.to_string(),
                format_minutes(phase.duration),
                format_number(phase.results),
                phase.elapsed.as_secs_f64()
            );
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "Requests:");
    let _ = writeln!(out, "  Total:      {}", format_number(report.requests));
    let _ = writeln!(out, "  Rate:       {} req/s", format_rate(report.rate));
    let _ = writeln!(out, "  Throughput: {} req/s", format_rate(report.throughput));
    let _ = writeln!(out, "  Success:    {:.2}%", report.success * 100.0);
    let _ = writeln!(out, "  Duration:   {} (+{} wait)", format_duration(report.duration), format_duration(report.wait));
    let _ = writeln!(out);

    let latency = &report.latency;
    let _ = writeln!(out, "Latency:");
    if latency.mean.is_some() {
        let _ = writeln!(out, "  Min:    {}", opt_duration(latency.min));
        let _ = writeln!(out, "  Mean:   {}", opt_duration(latency.mean));
        let _ = writeln!(out, "  Max:    {}", opt_duration(latency.max));
        let _ = writeln!(out, "  p50:    {}", opt_duration(latency.p50));
        let _ = writeln!(out, "  p90:    {}", opt_duration(latency.p90));
        let _ = writeln!(out, "  p95:    {}", opt_duration(latency.p95));
        let _ = writeln!(out, "  p99:    {}", opt_duration(latency.p99));
    } else {
        let _ = writeln!(out, "  No latency data collected");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Bytes:");
    let _ = writeln!(
        out,
        "  In:  {} total, {:.2} mean",
        format_bytes(report.bytes_in),
        report.mean_bytes_in()
    );
    let _ = writeln!(
        out,
        "  Out: {} total, {:.2} mean",
        format_bytes(report.bytes_out),
        report.mean_bytes_out()
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "Status Codes:");
    for (code, count) in &report.status_codes {
        let _ = writeln!(out, "  {:>4}: {}", code, format_number(*count));
    }
    let _ = writeln!(out);

    if !report.errors.is_empty() {
        let _ = writeln!(out, "Errors:");
        for error in report.errors.iter().take(MAX_DISPLAYED_ERRORS) {
            let _ = writeln!(out, "  {}", error);
        }
        if report.errors.len() > MAX_DISPLAYED_ERRORS {
            let _ = writeln!(out, "  ... and {} more", report.errors.len() - MAX_DISPLAYED_ERRORS);
        }
        let _ = writeln!(out, "  Total distinct errors: {}", report.errors.len());
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "{}", RULE);
    out
}

/// Print the final report to the console
pub fn print_results(report: &MetricsReport, summary: Option<&RunSummary>) {
    print!("{}", render_results(report, summary));
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result.chars().rev().collect()
}
