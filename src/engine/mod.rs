//! Attack engine abstraction
//!
//! An attack engine runs one phase of the ramp: it issues requests against the
//! target catalog at a fixed rate for a fixed duration and streams back one
//! [`AttackResult`] per request. The driver never dispatches requests itself; all
//! request-level concurrency lives inside the engine.
//!
//! # Engine Types
//!
//! - **HTTP**: paces real HTTP requests on a tokio runtime with a bounded
//!   number of in-flight requests ([`http::HttpEngine`])
//! - **Mock**: produces synthetic results instantly, for tests ([`mock::MockEngine`])
//!
//! # Example
//!
//! ```
//! use stairload::engine::{AttackEngine, Rate};
//! use stairload::engine::mock::MockEngine;
//! use stairload::target::TargetCatalog;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let mut engine = MockEngine::new();
//! let catalog = Arc::new(TargetCatalog::default());
//! let stream = engine
//!     .attack(catalog, Rate::per_second(5), Duration::from_secs(2), "demo")
//!     .unwrap();
//!
//! // The stream closes once the phase is over
//! assert_eq!(stream.iter().count(), 10);
//! ```

use crate::target::TargetCatalog;
use crate::Result;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub mod http;
pub mod mock;

/// Lazily drained sequence of results for one phase
///
/// The sending side is dropped once the phase's duration has elapsed and every
/// in-flight request has reported, which ends iteration on the receiver.
pub type ResultStream = crossbeam::channel::Receiver<AttackResult>;

/// Attack engine trait
///
/// # Lifecycle
///
/// 1. Create the engine (via `new()` on the concrete type)
/// 2. Call `attack()` once per phase and drain the returned stream to completion
///
/// # Thread Safety
///
/// Engines must be `Send` so the driver can be moved to another thread. The
/// stream they return may be fed from many threads at once.
pub trait AttackEngine: Send {
    /// Start one phase
    ///
    /// Requests are issued at `rate` for `duration`, each against the next
    /// target from `targets`. Every result carries `name` as its attack label.
    ///
    /// # Errors
    ///
    /// Returns an error only if the phase cannot be started at all. Failures of
    /// individual requests are reported inside their [`AttackResult`].
    fn attack(
        &mut self,
        targets: Arc<TargetCatalog>,
        rate: Rate,
        duration: Duration,
        name: &str,
    ) -> Result<ResultStream>;
}

/// Engine tuning shared by all engines
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of requests in flight at once
    pub max_workers: u64,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: 10,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Shortest gap the pacer can tick at
const MIN_INTERVAL: Duration = Duration::from_nanos(1);

/// Fixed request rate: `freq` hits every `per`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    pub freq: i64,
    pub per: Duration,
}

impl Rate {
    pub fn per_second(freq: i64) -> Self {
        Self {
            freq,
            per: Duration::from_secs(1),
        }
    }

    /// Gap between consecutive hits, or `None` when the rate issues nothing
    ///
    /// Never shorter than one nanosecond; faster rates are paced at that floor.
    pub fn interval(&self) -> Option<Duration> {
        if self.freq <= 0 || self.per.is_zero() {
            return None;
        }
        let divisor = u32::try_from(self.freq).unwrap_or(u32::MAX);
        Some((self.per / divisor).max(MIN_INTERVAL))
    }

    /// Number of hits this rate issues over `duration`
    pub fn hits_in(&self, duration: Duration) -> u64 {
        if self.freq <= 0 || self.per.is_zero() {
            return 0;
        }
        (self.freq as f64 * duration.as_secs_f64() / self.per.as_secs_f64()).round() as u64
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.per == Duration::from_secs(1) {
            write!(f, "{}/1s", self.freq)
        } else {
            write!(f, "{}/{:?}", self.freq, self.per)
        }
    }
}

/// Outcome of a single request
#[derive(Debug, Clone, PartialEq)]
pub struct AttackResult {
    /// Attack label the request was issued under
    pub attack: String,
    /// Sequence number within the phase
    pub seq: u64,
    /// HTTP status code, 0 if no response was received
    pub code: u16,
    /// When the request was sent
    pub timestamp: DateTime<Utc>,
    pub latency: Duration,
    pub bytes_out: u64,
    pub bytes_in: u64,
    /// Transport failure, or the status line of a non-2xx/3xx response
    pub error: Option<String>,
    pub method: String,
    pub url: String,
}

impl AttackResult {
    /// Whether the response status counts as a success (2xx or 3xx)
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.code)
    }

    /// When the response finished arriving
    pub fn end(&self) -> DateTime<Utc> {
        match chrono::Duration::from_std(self.latency) {
            Ok(latency) => self.timestamp + latency,
            Err(_) => self.timestamp,
        }
    }
}
