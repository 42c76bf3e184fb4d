//! Metrics aggregation
//!
//! A single [`MetricsAggregator`] is shared by everything that touches results:
//! the driver feeds it every [`AttackResult`] as phases run, the exporter reads
//! snapshots from it on its own timer, and the final report is built from it.
//!
//! # Features
//!
//! - **Serialized mutation**: one mutex guards all running counters, so
//!   concurrent `add` calls never lose an increment and readers never see a
//!   half-applied result
//! - **Status histogram**: counts per status code, keyed by the code as a string
//! - **Schema-stable snapshots**: the `"200"` key is always present, even before
//!   the first 200 response
//! - **Deduplicated errors**: each distinct error message is kept once, in the
//!   order first seen
//! - **Latency percentiles**: HdrHistogram-backed, for the final report
//!
//! # Example
//!
//! ```
//! use stairload::stats::MetricsAggregator;
//!
//! let metrics = MetricsAggregator::new();
//! let snapshot = metrics.snapshot();
//!
//! assert_eq!(snapshot.requests, 0);
//! assert_eq!(snapshot.status_codes.get("200"), Some(&0));
//! ```

pub mod exporter;
pub mod histogram;

use crate::engine::AttackResult;
use crate::util::time::calculate_rate;
use chrono::{DateTime, Utc};
use histogram::LatencyHistogram;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Histogram key every snapshot carries, observed or not
pub const BASELINE_STATUS: &str = "200";

/// Point-in-time copy of the exported metrics
///
/// Owns all of its data; later `add` calls never change a snapshot that has
/// already been taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub status_codes: BTreeMap<String, u64>,
    pub requests: u64,
    /// Ratio of 2xx/3xx responses to requests (0.0 - 1.0)
    pub success: f64,
}

/// Latency figures for the final report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencySummary {
    pub total: Duration,
    pub mean: Option<Duration>,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
    pub p50: Option<Duration>,
    pub p90: Option<Duration>,
    pub p95: Option<Duration>,
    pub p99: Option<Duration>,
}

/// Fully finalized view of everything the aggregator has seen
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsReport {
    pub requests: u64,
    pub successes: u64,
    /// Ratio of successful requests (0.0 - 1.0)
    pub success: f64,
    /// Requests per second between the first and the last request sent
    pub rate: f64,
    /// Successful requests per second, including the wait for the last response
    pub throughput: f64,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
    /// Time between the first and the last request sent
    pub duration: Duration,
    /// Time between the last request sent and the last response received
    pub wait: Duration,
    pub latency: LatencySummary,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub status_codes: BTreeMap<String, u64>,
    pub errors: Vec<String>,
}

impl MetricsReport {
    pub fn mean_bytes_in(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.bytes_in as f64 / self.requests as f64
    }

    pub fn mean_bytes_out(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.bytes_out as f64 / self.requests as f64
    }
}

/// Values derived from the raw counters by `finalize()`
#[derive(Debug, Clone, Copy, Default)]
struct Derived {
    success: f64,
    rate: f64,
    throughput: f64,
    duration: Duration,
    wait: Duration,
}

/// Running aggregate, only ever touched with the aggregator's lock held
#[derive(Debug, Default)]
struct MetricsState {
    requests: u64,
    successes: u64,
    status_codes: BTreeMap<String, u64>,
    errors: Vec<String>,
    seen_errors: HashSet<String>,
    latencies: LatencyHistogram,
    bytes_in: u64,
    bytes_out: u64,
    earliest: Option<DateTime<Utc>>,
    latest: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    derived: Derived,
}

impl MetricsState {
    fn add(&mut self, result: &AttackResult) {
        self.requests += 1;
        if result.is_success() {
            self.successes += 1;
        }
        *self.status_codes.entry(result.code.to_string()).or_insert(0) += 1;

        if let Some(error) = result.error.as_ref().filter(|e| !e.is_empty()) {
            if self.seen_errors.insert(error.clone()) {
                self.errors.push(error.clone());
            }
        }

        self.latencies.record(result.latency);
        self.bytes_in = self.bytes_in.saturating_add(result.bytes_in);
        self.bytes_out = self.bytes_out.saturating_add(result.bytes_out);

        let sent = result.timestamp;
        if self.earliest.map_or(true, |t| sent < t) {
            self.earliest = Some(sent);
        }
        if self.latest.map_or(true, |t| sent > t) {
            self.latest = Some(sent);
        }
        let end = result.end();
        if self.end.map_or(true, |t| end > t) {
            self.end = Some(end);
        }
    }

    /// Recompute every derived field from the raw counters
    ///
    /// Pure function of the counters, so calling it repeatedly is harmless.
    fn finalize(&mut self) {
        let span = |from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>| match (from, to) {
            (Some(from), Some(to)) => (to - from).to_std().unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        };

        let duration = span(self.earliest, self.latest);
        let wait = span(self.latest, self.end);

        self.derived = Derived {
            success: if self.requests > 0 {
                self.successes as f64 / self.requests as f64
            } else {
                0.0
            },
            rate: calculate_rate(self.requests, duration),
            throughput: calculate_rate(self.successes, duration + wait),
            duration,
            wait,
        };
    }
}

/// Thread-safe result accumulator
///
/// Every operation takes the one internal lock for as long as it reads or
/// writes the shared fields and no longer; no I/O happens under the lock.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    state: Mutex<MetricsState>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MetricsState> {
        // A panic while holding the lock cannot leave the counters torn:
        // every update is a sequence of independent field writes.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fold one result into the aggregate
    pub fn add(&self, result: &AttackResult) {
        self.lock().add(result);
    }

    /// Distinct error messages seen so far, in first-seen order
    pub fn errors(&self) -> Vec<String> {
        self.lock().errors.clone()
    }

    /// Requests counted so far
    pub fn requests(&self) -> u64 {
        self.lock().requests
    }

    /// Schema-normalized copy of the current state
    ///
    /// Records the baseline `"200"` key (with a zero count) the first time it
    /// is missing, so later snapshots keep reporting it alongside later adds.
    pub fn snapshot(&self) -> Snapshot {
        let mut state = self.lock();
        state.finalize();
        state
            .status_codes
            .entry(BASELINE_STATUS.to_string())
            .or_insert(0);

        Snapshot {
            status_codes: state.status_codes.clone(),
            requests: state.requests,
            success: state.derived.success,
        }
    }

    /// Finalize derived fields before a final read
    ///
    /// Safe to call any number of times, and `add` keeps working afterwards.
    pub fn close(&self) {
        self.lock().finalize();
    }

    /// Finalized view of everything seen so far
    pub fn report(&self) -> MetricsReport {
        let mut state = self.lock();
        state.finalize();

        let latencies = &state.latencies;
        let latency = LatencySummary {
            total: latencies.total(),
            mean: latencies.mean(),
            min: latencies.min(),
            max: latencies.max(),
            p50: latencies.percentile(50.0),
            p90: latencies.percentile(90.0),
            p95: latencies.percentile(95.0),
            p99: latencies.percentile(99.0),
        };

        MetricsReport {
            requests: state.requests,
            successes: state.successes,
            success: state.derived.success,
            rate: state.derived.rate,
            throughput: state.derived.throughput,
            earliest: state.earliest,
            latest: state.latest,
            duration: state.derived.duration,
            wait: state.derived.wait,
            latency,
            bytes_in: state.bytes_in,
            bytes_out: state.bytes_out,
            status_codes: state.status_codes.clone(),
            errors: state.errors.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn result(code: u16, error: Option<&str>) -> AttackResult {
        AttackResult {
            attack: "test".to_string(),
            seq: 0,
            code,
            timestamp: Utc::now(),
            latency: Duration::from_millis(10),
            bytes_out: 8,
            bytes_in: 32,
            error: error.map(str::to_string),
            method: "GET".to_string(),
            url: "http://localhost/".to_string(),
        }
    }

    fn at(base: DateTime<Utc>, offset_ms: i64, latency_ms: u64) -> AttackResult {
        AttackResult {
            timestamp: base + chrono::Duration::milliseconds(offset_ms),
            latency: Duration::from_millis(latency_ms),
            ..result(200, None)
        }
    }

    #[test]
    fn test_empty_snapshot_has_baseline_key() {
        let metrics = MetricsAggregator::new();
        let snapshot = metrics.snapshot();

        assert_eq!(snapshot.requests, 0);
        assert_eq!(snapshot.success, 0.0);
        assert_eq!(snapshot.status_codes.len(), 1);
        assert_eq!(snapshot.status_codes[BASELINE_STATUS], 0);
    }

    #[test]
    fn test_baseline_key_without_any_200() {
        let metrics = MetricsAggregator::new();
        metrics.add(&result(500, Some("500 Internal Server Error")));
        metrics.add(&result(404, Some("404 Not Found")));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.status_codes["200"], 0);
        assert_eq!(snapshot.status_codes["500"], 1);
        assert_eq!(snapshot.status_codes["404"], 1);
        assert_eq!(snapshot.requests, 2);
    }

    #[test]
    fn test_baseline_key_counts_later_adds() {
        let metrics = MetricsAggregator::new();
        let _ = metrics.snapshot();
        metrics.add(&result(200, None));

        assert_eq!(metrics.snapshot().status_codes["200"], 1);
    }

    #[test]
    fn test_add_counts_requests_and_success() {
        let metrics = MetricsAggregator::new();
        metrics.add(&result(200, None));
        metrics.add(&result(301, None));
        metrics.add(&result(503, Some("503 Service Unavailable")));
        metrics.add(&result(0, Some("connection refused")));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 4);
        assert_eq!(snapshot.success, 0.5);
        assert_eq!(snapshot.status_codes["0"], 1);
        assert_eq!(snapshot.status_codes["301"], 1);
    }

    #[test]
    fn test_errors_are_deduplicated_in_order() {
        let metrics = MetricsAggregator::new();
        metrics.add(&result(0, Some("timeout")));
        metrics.add(&result(0, Some("connection refused")));
        metrics.add(&result(0, Some("timeout")));
        metrics.add(&result(200, None));
        metrics.add(&result(0, Some("")));

        assert_eq!(metrics.errors(), vec!["timeout", "connection refused"]);
    }

    #[test]
    fn test_snapshot_is_not_aliased() {
        let metrics = MetricsAggregator::new();
        metrics.add(&result(200, None));

        let before = metrics.snapshot();
        metrics.add(&result(200, None));
        metrics.add(&result(500, Some("boom")));

        assert_eq!(before.requests, 1);
        assert_eq!(before.status_codes["200"], 1);
        assert!(!before.status_codes.contains_key("500"));
        assert_eq!(metrics.snapshot().requests, 3);
    }

    #[test]
    fn test_concurrent_adds_lose_nothing() {
        for workers in [1usize, 2, 8, 32] {
            let metrics = Arc::new(MetricsAggregator::new());
            let per_worker = 500;

            let handles: Vec<_> = (0..workers)
                .map(|w| {
                    let metrics = Arc::clone(&metrics);
                    thread::spawn(move || {
                        for i in 0..per_worker {
                            let code = if (w + i) % 4 == 0 { 500 } else { 200 };
                            metrics.add(&result(code, None));
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            let snapshot = metrics.snapshot();
            let total = (workers * per_worker) as u64;
            assert_eq!(snapshot.requests, total);
            assert_eq!(snapshot.status_codes.values().sum::<u64>(), total);
        }
    }

    #[test]
    fn test_snapshots_during_adds_are_consistent() {
        let metrics = Arc::new(MetricsAggregator::new());
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.add(&result(200, None));
                    }
                })
            })
            .collect();

        let mut last = 0;
        for _ in 0..200 {
            let snapshot = metrics.snapshot();
            // Histogram and counter always move together
            assert_eq!(snapshot.status_codes["200"], snapshot.requests);
            assert!(snapshot.requests >= last);
            last = snapshot.requests;
        }

        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(metrics.requests(), 4000);
    }

    #[test]
    fn test_close_is_idempotent() {
        let metrics = MetricsAggregator::new();
        metrics.add(&result(200, None));
        metrics.close();
        metrics.close();
        let first = metrics.report();
        metrics.close();
        assert_eq!(metrics.report(), first);

        metrics.add(&result(200, None));
        assert_eq!(metrics.report().requests, 2);
    }

    #[test]
    fn test_report_derived_fields() {
        let base = Utc::now();
        let metrics = MetricsAggregator::new();
        metrics.add(&at(base, 0, 100));
        metrics.add(&at(base, 1000, 100));
        metrics.add(&at(base, 2000, 500));
        metrics.add(&AttackResult {
            error: Some("404 Not Found".to_string()),
            ..AttackResult { code: 404, ..at(base, 1500, 100) }
        });

        let report = metrics.report();
        assert_eq!(report.requests, 4);
        assert_eq!(report.successes, 3);
        assert_eq!(report.success, 0.75);
        assert_eq!(report.duration, Duration::from_secs(2));
        assert_eq!(report.wait, Duration::from_millis(500));
        assert_eq!(report.rate, 2.0);
        assert_eq!(report.throughput, 3.0 / 2.5);
        assert_eq!(report.earliest, Some(base));
        assert_eq!(report.latency.total, Duration::from_millis(800));
        assert_eq!(report.latency.mean, Some(Duration::from_millis(200)));
        assert_eq!(report.bytes_in, 128);
        assert_eq!(report.bytes_out, 32);
        assert_eq!(report.mean_bytes_in(), 32.0);
        assert_eq!(report.errors, vec!["404 Not Found"]);
    }

    #[test]
    fn test_report_empty() {
        let report = MetricsAggregator::new().report();
        assert_eq!(report.requests, 0);
        assert_eq!(report.rate, 0.0);
        assert_eq!(report.duration, Duration::ZERO);
        assert!(report.latency.p99.is_none());
        assert_eq!(report.mean_bytes_out(), 0.0);
    }
}
