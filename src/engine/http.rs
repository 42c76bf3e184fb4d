//! HTTP attack engine
//!
//! Runs each phase on a dedicated tokio runtime owned by the engine. A pacer
//! task ticks once per `rate.interval()`, takes a worker permit, and spawns one
//! request against the next catalog target. Results are pushed into a
//! crossbeam channel that the (synchronous) driver drains.
//!
//! # Concurrency
//!
//! - At most `max_workers` requests are in flight; when all permits are taken
//!   the pacer waits, and missed ticks are issued in a burst once a permit frees
//!   up so the phase still approaches its nominal request count.
//! - The phase ends when its duration has elapsed and every in-flight request
//!   has reported; only then does the stream close.
//! - Rates faster than one hit per nanosecond are paced at that floor.
//!
//! A phase with a non-positive rate issues no requests but still lasts its full
//! duration, so later phases keep their place on the timeline.

use super::{AttackEngine, AttackResult, EngineConfig, Rate, ResultStream};
use crate::target::{Target, TargetCatalog};
use crate::Result;
use anyhow::Context;
use chrono::Utc;
use crossbeam::channel::Sender;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

/// Error attached to results issued against an empty catalog
pub const NO_TARGETS: &str = "no targets to attack";

/// HTTP attack engine
pub struct HttpEngine {
    runtime: Runtime,
    client: reqwest::Client,
    config: EngineConfig,
}

impl HttpEngine {
    /// Create the engine, its runtime and its HTTP client
    ///
    /// # Errors
    ///
    /// Fails if the runtime or the client cannot be built.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("stairload-http")
            .build()
            .context("Failed to create tokio runtime")?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.max_workers as usize)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            runtime,
            client,
            config,
        })
    }
}

impl AttackEngine for HttpEngine {
    fn attack(
        &mut self,
        targets: Arc<TargetCatalog>,
        rate: Rate,
        duration: Duration,
        name: &str,
    ) -> Result<ResultStream> {
        let (tx, rx) = crossbeam::channel::unbounded();

        let permits = (self.config.max_workers as usize).clamp(1, Semaphore::MAX_PERMITS);
        let phase = PhaseRun {
            client: self.client.clone(),
            targets,
            rate,
            duration,
            name: name.to_string(),
            workers: Arc::new(Semaphore::new(permits)),
            results: tx,
        };

        tracing::debug!(%rate, ?duration, max_workers = permits, "starting HTTP phase");
        self.runtime.spawn(phase.run());

        Ok(rx)
    }
}

/// Everything one phase needs, moved onto the runtime
struct PhaseRun {
    client: reqwest::Client,
    targets: Arc<TargetCatalog>,
    rate: Rate,
    duration: Duration,
    name: String,
    workers: Arc<Semaphore>,
    results: Sender<AttackResult>,
}

impl PhaseRun {
    async fn run(self) {
        let deadline = Instant::now() + self.duration;

        let Some(interval) = self.rate.interval() else {
            tracing::warn!(rate = %self.rate, "non-positive rate, holding phase without requests");
            tokio::time::sleep_until(deadline).await;
            return;
        };

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        let mut in_flight = JoinSet::new();
        let mut seq = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tokio::time::sleep_until(deadline) => break,
            }
            if Instant::now() >= deadline {
                break;
            }

            let permit = tokio::select! {
                permit = Arc::clone(&self.workers).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = tokio::time::sleep_until(deadline) => break,
            };

            let target = self.targets.next().cloned();
            let client = self.client.clone();
            let results = self.results.clone();
            let name = self.name.clone();

            in_flight.spawn(async move {
                let result = hit(&client, target, seq, name).await;
                drop(permit);
                // The driver only goes away if the whole run is being torn down
                let _ = results.send(result);
            });
            seq += 1;

            while in_flight.try_join_next().is_some() {}
        }

        while in_flight.join_next().await.is_some() {}
        tracing::debug!(requests = seq, "HTTP phase finished");
    }
}

/// Issue one request and describe how it went
async fn hit(
    client: &reqwest::Client,
    target: Option<Target>,
    seq: u64,
    name: String,
) -> AttackResult {
    let started = Instant::now();
    let mut result = AttackResult {
        attack: name,
        seq,
        code: 0,
        timestamp: Utc::now(),
        latency: Duration::ZERO,
        bytes_out: 0,
        bytes_in: 0,
        error: None,
        method: String::new(),
        url: String::new(),
    };

    let Some(target) = target else {
        result.error = Some(NO_TARGETS.to_string());
        return result;
    };
    result.method = target.method.clone();
    result.url = target.url.clone();

    let method = match reqwest::Method::from_bytes(target.method.as_bytes()) {
        Ok(method) => method,
        Err(e) => {
            result.error = Some(e.to_string());
            return result;
        }
    };

    let mut request = client.request(method, target.url.as_str());
    for (header, values) in &target.header {
        for value in values {
            request = request.header(header.as_str(), value.as_str());
        }
    }
    result.bytes_out = target.body.len() as u64;

    match request.body(target.body).send().await {
        Ok(response) => {
            let status = response.status();
            result.code = status.as_u16();
            match response.bytes().await {
                Ok(body) => result.bytes_in = body.len() as u64,
                Err(e) => result.error = Some(e.to_string()),
            }
            if result.error.is_none() && !result.is_success() {
                result.error = Some(status.to_string());
            }
        }
        Err(e) => result.error = Some(e.to_string()),
    }

    result.latency = started.elapsed();
    result
}
