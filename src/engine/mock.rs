//! Mock attack engine for testing
//!
//! Produces synthetic results without touching the network and without waiting
//! for the phase duration to elapse, which keeps driver tests fast and
//! deterministic.
//!
//! # Features
//!
//! - One result per hit the rate would issue over the phase duration
//! - Configurable status codes (cycled per hit) and error message
//! - Results are sent from a configurable number of threads
//! - Records every phase it was asked to run
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
//! engine.set_status_codes(vec![200, 500]);
//!
//! let stream = engine
//!     .attack(Arc::new(TargetCatalog::default()), Rate::per_second(2), Duration::from_secs(1), "t")
//!     .unwrap();
//! let codes: Vec<u16> = stream.iter().map(|r| r.code).collect();
//! assert_eq!(codes.len(), 2);
//! assert_eq!(engine.phases_run().len(), 1);
//! ```

use super::{AttackEngine, AttackResult, Rate, ResultStream};
use crate::target::TargetCatalog;
use crate::Result;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Record of a phase the mock engine was asked to run
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseRecord {
    pub rate: Rate,
    pub duration: Duration,
    pub name: String,
    pub targets: usize,
}

/// Mock attack engine
#[derive(Debug, Clone)]
pub struct MockEngine {
    /// Status codes handed out round-robin, one per hit
    status_codes: Arc<Mutex<Vec<u16>>>,

    /// Error attached to every non-2xx/3xx result (code 0 always gets one)
    error_message: Arc<Mutex<String>>,

    /// Whether `attack()` itself should fail
    fail_start: Arc<Mutex<bool>>,

    latency: Duration,
    bytes_in: u64,

    /// Threads used to emit each phase's results
    senders: usize,

    phases: Arc<Mutex<Vec<PhaseRecord>>>,
}

impl MockEngine {
    /// Create a mock engine that answers every hit with `200` after 1ms
    pub fn new() -> Self {
        Self {
            status_codes: Arc::new(Mutex::new(vec![200])),
            error_message: Arc::new(Mutex::new("mock failure".to_string())),
            fail_start: Arc::new(Mutex::new(false)),
            latency: Duration::from_millis(1),
            bytes_in: 64,
            senders: 1,
            phases: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Emit results from `senders` threads at once
    pub fn with_senders(mut self, senders: usize) -> Self {
        self.senders = senders.max(1);
        self
    }

    pub fn set_status_codes(&self, codes: Vec<u16>) {
        *self.status_codes.lock().unwrap_or_else(|e| e.into_inner()) = codes;
    }

    pub fn set_error_message(&self, message: impl Into<String>) {
        *self.error_message.lock().unwrap_or_else(|e| e.into_inner()) = message.into();
    }

    /// Make the next `attack()` calls fail before producing any results
    pub fn set_fail_start(&self, fail: bool) {
        *self.fail_start.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    /// Phases run so far, in call order
    pub fn phases_run(&self) -> Vec<PhaseRecord> {
        self.phases.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AttackEngine for MockEngine {
    fn attack(
        &mut self,
        targets: Arc<TargetCatalog>,
        rate: Rate,
        duration: Duration,
        name: &str,
    ) -> Result<ResultStream> {
        if *self.fail_start.lock().unwrap_or_else(|e| e.into_inner()) {
            anyhow::bail!("mock engine refused to start phase at {}", rate);
        }

        self.phases
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(PhaseRecord {
                rate,
                duration,
                name: name.to_string(),
                targets: targets.len(),
            });

        let hits = rate.hits_in(duration);
        let codes = self.status_codes.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let error_message = self.error_message.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let (tx, rx) = crossbeam::channel::unbounded();

        let senders = self.senders as u64;
        for sender in 0..senders {
            let tx = tx.clone();
            let targets = Arc::clone(&targets);
            let codes = codes.clone();
            let error_message = error_message.clone();
            let name = name.to_string();
            let latency = self.latency;
            let bytes_in = self.bytes_in;

            thread::spawn(move || {
                let mut seq = sender;
                while seq < hits {
                    let code = if codes.is_empty() {
                        200
                    } else {
                        codes[(seq % codes.len() as u64) as usize]
                    };
                    let (method, url, bytes_out) = match targets.next() {
                        Some(t) => (t.method.clone(), t.url.clone(), t.body.len() as u64),
                        None => ("GET".to_string(), "mock://".to_string(), 0),
                    };
                    let error = if (200..400).contains(&code) {
                        None
                    } else {
                        Some(error_message.clone())
                    };
                    let result = AttackResult {
                        attack: name.clone(),
                        seq,
                        code,
                        timestamp: Utc::now(),
                        latency,
                        bytes_out,
                        bytes_in: if code == 0 { 0 } else { bytes_in },
                        error,
                        method,
                        url,
                    };
                    if tx.send(result).is_err() {
                        break;
                    }
                    seq += senders;
                }
            });
        }

        Ok(rx)
    }
}
