//! Request latency histogram using HdrHistogram
//!
//! Records the latency of every request so the final report can quote
//! percentiles without keeping individual samples around.
//!
//! # Example
//!
//! ```
//! use stairload::stats::histogram::LatencyHistogram;
//! use std::time::Duration;
//!
//! let mut hist = LatencyHistogram::new();
//! hist.record(Duration::from_millis(12));
//! hist.record(Duration::from_millis(30));
//!
//! let p99 = hist.percentile(99.0).unwrap();
//! assert!(p99 >= Duration::from_millis(29));
//! ```

use hdrhistogram::Histogram;
use std::time::Duration;

/// Upper bound of the tracked range: one hour in nanoseconds
const MAX_LATENCY_NANOS: u64 = 3_600_000_000_000;

/// Latency histogram wrapper
///
/// Tracks latencies from 1 nanosecond to 1 hour with 3 significant digits,
/// i.e. every reported value is within 0.1% of the recorded one. Values outside
/// the range are clamped.
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    histogram: Histogram<u64>,
    /// Exact sum of recorded latencies (the histogram mean is quantized)
    total: Duration,
}

impl LatencyHistogram {
    pub fn new() -> Self {
        let histogram = Histogram::new_with_bounds(1, MAX_LATENCY_NANOS, 3)
            .expect("Failed to create histogram with valid bounds");

        Self {
            histogram,
            total: Duration::ZERO,
        }
    }

    /// Record one latency sample
    #[inline]
    pub fn record(&mut self, latency: Duration) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        let value = nanos.clamp(1, MAX_LATENCY_NANOS);
        let _ = self.histogram.record(value);
        self.total = self.total.saturating_add(latency);
    }

    /// Latency at `percentile` (0.0 - 100.0), or `None` when empty
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.value_at_percentile(percentile)))
    }

    pub fn min(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.min()))
    }

    pub fn max(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.max()))
    }

    /// Exact mean of the recorded samples
    pub fn mean(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(self.total / u32::try_from(self.len()).unwrap_or(u32::MAX))
    }

    /// Exact sum of the recorded samples
    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.len() == 0
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}
