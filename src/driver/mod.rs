//! Phase driver
//!
//! The driver walks a [`RatePlan`] strictly in order. For each phase it asks the
//! engine to attack at the phase's rate for the phase's duration, then drains
//! the returned stream into the shared [`MetricsAggregator`] before the next
//! phase begins. It never dispatches requests itself, so at most one phase is
//! ever in flight.
//!
//! # Example
//!
//! ```
//! use stairload::driver::Driver;
//! use stairload::engine::mock::MockEngine;
//! use stairload::schedule::compute_plan;
//! use stairload::stats::MetricsAggregator;
//! use stairload::target::TargetCatalog;
//! use std::sync::Arc;
//!
//! let plan = compute_plan(1, 1, 3, 1).unwrap();
//! let metrics = Arc::new(MetricsAggregator::new());
//! let mut driver = Driver::new(
//!     MockEngine::new(),
//!     Arc::new(TargetCatalog::default()),
//!     Arc::clone(&metrics),
//!     "demo",
//! );
//!
//! let summary = driver.run(&plan).unwrap();
//! assert_eq!(summary.phases.len(), 3);
//! // 1/s for 60s, 2/s for 60s, 3/s for 120s
//! assert_eq!(metrics.requests(), 60 + 120 + 360);
//! ```

use crate::engine::{AttackEngine, Rate};
use crate::schedule::{Phase, RatePlan};
use crate::stats::MetricsAggregator;
use crate::target::TargetCatalog;
use crate::Result;
use anyhow::Context;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What happened during one phase
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseOutcome {
    pub index: usize,
    pub rate: Rate,
    /// Planned duration
    pub duration: Duration,
    /// Results drained from the engine
    pub results: u64,
    /// Wall-clock time from start until the stream closed
    pub elapsed: Duration,
}

/// Outcome of a complete run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub phases: Vec<PhaseOutcome>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn total_results(&self) -> u64 {
        self.phases.iter().map(|p| p.results).sum()
    }
}

/// Sequential phase loop
pub struct Driver<E: AttackEngine> {
    engine: E,
    targets: Arc<TargetCatalog>,
    metrics: Arc<MetricsAggregator>,
    name: String,
}

impl<E: AttackEngine> Driver<E> {
    pub fn new(
        engine: E,
        targets: Arc<TargetCatalog>,
        metrics: Arc<MetricsAggregator>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            targets,
            metrics,
            name: name.into(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Run every phase of `plan` in order
    ///
    /// # Errors
    ///
    /// Fails if the engine cannot start a phase. Results already drained stay
    /// in the aggregator.
    pub fn run(&mut self, plan: &RatePlan) -> Result<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        tracing::info!(
            phases = plan.len(),
            duration = ?plan.total_duration(),
            targets = self.targets.len(),
            "starting ramp"
        );

        for phase in plan {
            let outcome = self.run_phase(phase)?;
            summary.phases.push(outcome);
        }

        summary.elapsed = started.elapsed();
        tracing::info!(
            results = summary.total_results(),
            elapsed = ?summary.elapsed,
            "ramp finished"
        );
        Ok(summary)
    }

    fn run_phase(&mut self, phase: &Phase) -> Result<PhaseOutcome> {
        let rate = Rate::per_second(phase.frequency);
        tracing::info!(phase = phase.index, %rate, duration = ?phase.duration, "phase started");

        let started = Instant::now();
        let stream = self
            .engine
            .attack(Arc::clone(&self.targets), rate, phase.duration, &self.name)
            .with_context(|| format!("Failed to start phase {} at {}", phase.index, rate))?;

        let mut results = 0u64;
        for result in stream.iter() {
            self.metrics.add(&result);
            results += 1;
        }

        let elapsed = started.elapsed();
        tracing::info!(phase = phase.index, results, elapsed = ?elapsed, "phase finished");

        Ok(PhaseOutcome {
            index: phase.index,
            rate,
            duration: phase.duration,
            results,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockEngine;
    use crate::schedule::compute_plan;
    use crate::target::Target;

    fn catalog() -> Arc<TargetCatalog> {
        Arc::new(TargetCatalog::new(vec![Target {
            method: "GET".to_string(),
            url: "http://localhost/".to_string(),
            ..Default::default()
        }]))
    }

    #[test]
    fn test_driver_runs_phases_in_order() {
        let plan = compute_plan(1, 1, 3, 1).unwrap();
        let metrics = Arc::new(MetricsAggregator::new());
        let mut driver = Driver::new(MockEngine::new(), catalog(), Arc::clone(&metrics), "order");

        let summary = driver.run(&plan).unwrap();

        let phases = driver.engine().phases_run();
        let rates: Vec<i64> = phases.iter().map(|p| p.rate.freq).collect();
        let durations: Vec<u64> = phases.iter().map(|p| p.duration.as_secs()).collect();
        assert_eq!(rates, vec![1, 2, 3]);
        assert_eq!(durations, vec![60, 60, 120]);
        assert!(phases.iter().all(|p| p.name == "order" && p.targets == 1));

        let indexes: Vec<usize> = summary.phases.iter().map(|p| p.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(summary.phases[2].results, 360);
    }

    #[test]
    fn test_driver_feeds_every_result() {
        let plan = compute_plan(2, 3, 2, 0).unwrap();
        let metrics = Arc::new(MetricsAggregator::new());
        let engine = MockEngine::new().with_senders(8);
        engine.set_status_codes(vec![200, 503]);
        engine.set_error_message("503 Service Unavailable");
        let mut driver = Driver::new(engine, catalog(), Arc::clone(&metrics), "feed");

        let summary = driver.run(&plan).unwrap();

        // 2/s for 60s then 5/s for 60s
        assert_eq!(summary.total_results(), 420);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 420);
        assert_eq!(snapshot.status_codes.values().sum::<u64>(), 420);
        assert_eq!(metrics.errors(), vec!["503 Service Unavailable"]);
    }

    #[test]
    fn test_driver_holds_non_positive_phases() {
        let plan = compute_plan(1, -1, 3, 0).unwrap();
        let metrics = Arc::new(MetricsAggregator::new());
        let mut driver = Driver::new(MockEngine::new(), catalog(), Arc::clone(&metrics), "down");

        let summary = driver.run(&plan).unwrap();

        // Rates 1, 0, -1: every phase still runs, only the first issues hits
        assert_eq!(driver.engine().phases_run().len(), 3);
        let results: Vec<u64> = summary.phases.iter().map(|p| p.results).collect();
        assert_eq!(results, vec![60, 0, 0]);
        assert_eq!(metrics.requests(), 60);
    }

    #[test]
    fn test_driver_engine_failure() {
        let plan = compute_plan(1, 1, 2, 0).unwrap();
        let metrics = Arc::new(MetricsAggregator::new());
        let engine = MockEngine::new();
        engine.set_fail_start(true);
        let mut driver = Driver::new(engine, catalog(), Arc::clone(&metrics), "fail");

        let err = driver.run(&plan).unwrap_err();
        assert!(err.to_string().contains("Failed to start phase 0"));
        assert_eq!(metrics.requests(), 0);
    }

    #[test]
    fn test_driver_with_empty_catalog() {
        let plan = compute_plan(1, 0, 1, 0).unwrap();
        let metrics = Arc::new(MetricsAggregator::new());
        let mut driver = Driver::new(
            MockEngine::new(),
            Arc::new(TargetCatalog::default()),
            Arc::clone(&metrics),
            "empty",
        );

        let summary = driver.run(&plan).unwrap();
        assert_eq!(summary.total_results(), 60);
        assert_eq!(driver.engine().phases_run()[0].targets, 0);
    }
}
