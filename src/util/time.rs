//! Timing and formatting utilities
//!
//! Helpers for turning counts and durations into rates, and for rendering
//! durations, rates, and byte counts in human-readable form for reports.

use std::time::Duration;

/// Format a duration in human-readable form
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use stairload::util::time::format_duration;
///
/// assert_eq!(format_duration(Duration::from_nanos(500)), "500ns");
/// assert_eq!(format_duration(Duration::from_nanos(1500)), "1.50us");
/// assert_eq!(format_duration(Duration::from_micros(2500)), "2.50ms");
/// assert_eq!(format_duration(Duration::from_secs(5)), "5.00s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();

    if nanos < 1_000 {
        format!("{}ns", nanos)
    } else if nanos < 1_000_000 {
        format!("{:.2}us", nanos as f64 / 1_000.0)
    } else if nanos < 1_000_000_000 {
        format!("{:.2}ms", nanos as f64 / 1_000_000.0)
    } else {
        format!("{:.2}s", nanos as f64 / 1_000_000_000.0)
    }
}

/// Format a phase length as whole minutes when it is one
///
/// Ramp phases are always minute-aligned, so `3m` reads better than `180.00s`.
///
/// ```
/// use std::time::Duration;
/// use stairload::util::time::format_minutes;
///
/// assert_eq!(format_minutes(Duration::from_secs(180)), "3m");
/// assert_eq!(format_minutes(Duration::from_secs(90)), "1.50m");
/// ```
pub fn format_minutes(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs % 60 == 0 && duration.subsec_nanos() == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.2}m", duration.as_secs_f64() / 60.0)
    }
}

/// Format a rate (requests per second)
///
/// # Examples
///
/// ```
/// use stairload::util::time::format_rate;
///
/// assert_eq!(format_rate(500.0), "500");
/// assert_eq!(format_rate(1500.0), "1.50K");
/// assert_eq!(format_rate(2_500_000.0), "2.50M");
/// ```
pub fn format_rate(rate: f64) -> String {
    if rate < 1_000.0 {
        format!("{:.0}", rate)
    } else if rate < 1_000_000.0 {
        format!("{:.2}K", rate / 1_000.0)
    } else if rate < 1_000_000_000.0 {
        format!("{:.2}M", rate / 1_000_000.0)
    } else {
        format!("{:.2}G", rate / 1_000_000_000.0)
    }
}

/// Calculate a per-second rate from an event count and the span it covered
///
/// Returns 0.0 for an empty span.
pub fn calculate_rate(events: u64, duration: Duration) -> f64 {
    let seconds = duration.as_secs_f64();
    if seconds > 0.0 {
        events as f64 / seconds
    } else {
        0.0
    }
}

/// Format a byte count (B, KB, MB, GB, TB)
///
/// ```
/// use stairload::util::time::format_bytes;
///
/// assert_eq!(format_bytes(512), "512B");
/// assert_eq!(format_bytes(1536), "1.50KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2}TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2}GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2}MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2}KB", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}
