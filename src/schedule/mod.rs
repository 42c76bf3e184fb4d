//! Ramp schedule
//!
//! Converts the four ramp parameters into an ordered [`RatePlan`]: one phase per
//! ramp minute, each holding a fixed request rate, with the last phase stretched
//! to cover the plateau.
//!
//! ```text
//! rate
//!  ^                 +-----------------+
//!  |           +-----+    plateau      |
//!  |     +-----+                       |
//!  +-----+                             |
//!  +--1m---1m----1m-----(plateau+1)m---+--> time
//! ```
//!
//! # Example
//!
//! ```
//! use stairload::schedule::compute_plan;
//! use std::time::Duration;
//!
//! let plan = compute_plan(1, 1, 3, 1).unwrap();
//! let freqs: Vec<i64> = plan.phases().iter().map(|p| p.frequency).collect();
//! assert_eq!(freqs, vec![1, 2, 3]);
//! // The last phase holds for the plateau plus its own minute
//! assert_eq!(plan.phases()[2].duration, Duration::from_secs(120));
//! ```
//!
//! The plan does not clamp rates: a negative slope steeper than the start rate
//! yields zero or negative frequencies, and it is up to the engine to decide
//! what such a phase means.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

const MINUTE: Duration = Duration::from_secs(60);

/// Ramp parameters that cannot produce a well-formed plan
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("duration_minutes must be at least 1, got {0}")]
    InvalidDuration(i64),
    #[error("plateau_minutes must not be negative, got {0}")]
    NegativePlateau(i64),
}

/// A contiguous window during which requests are issued at one fixed rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    /// Position in the plan (0-based)
    pub index: usize,
    /// Requests per second
    pub frequency: i64,
    /// How long the rate is held
    pub duration: Duration,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "phase {}: {} req/s for {}",
            self.index,
            self.frequency,
            crate::util::time::format_minutes(self.duration)
        )
    }
}

/// Ordered, immutable sequence of phases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatePlan {
    phases: Vec<Phase>,
}

impl RatePlan {
    /// Phases in execution order
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Wall-clock length of the whole ramp
    pub fn total_duration(&self) -> Duration {
        self.phases.iter().map(|p| p.duration).sum()
    }

    /// Rate held during the plateau (the last phase)
    pub fn peak_frequency(&self) -> Option<i64> {
        self.phases.last().map(|p| p.frequency)
    }

    /// Requests the plan asks for if every phase runs exactly at its rate
    ///
    /// Non-positive phases contribute nothing.
    pub fn expected_requests(&self) -> u64 {
        self.phases
            .iter()
            .filter(|p| p.frequency > 0)
            .map(|p| (p.frequency as u64).saturating_mul(p.duration.as_secs()))
            .fold(0u64, |acc, n| acc.saturating_add(n))
    }
}

impl<'a> IntoIterator for &'a RatePlan {
    type Item = &'a Phase;
    type IntoIter = std::slice::Iter<'a, Phase>;

    fn into_iter(self) -> Self::IntoIter {
        self.phases.iter()
    }
}

/// Compute the staircase plan
///
/// Phase `i` (for `i` in `0..duration_minutes`) runs at
/// `start_freq + i * slope_per_minute` requests per second for one minute,
/// except the last phase which runs for `plateau_minutes + 1` minutes.
///
/// # Errors
///
/// Returns [`PlanError`] if `duration_minutes < 1` or `plateau_minutes < 0`.
pub fn compute_plan(
    start_freq: i64,
    slope_per_minute: i64,
    duration_minutes: i64,
    plateau_minutes: i64,
) -> Result<RatePlan, PlanError> {
    if duration_minutes < 1 {
        return Err(PlanError::InvalidDuration(duration_minutes));
    }
    if plateau_minutes < 0 {
        return Err(PlanError::NegativePlateau(plateau_minutes));
    }

    let last = duration_minutes - 1;
    let plateau = MINUTE.saturating_mul(u32::try_from(plateau_minutes + 1).unwrap_or(u32::MAX));

    let phases = (0..duration_minutes)
        .map(|i| Phase {
            index: i as usize,
            frequency: start_freq.saturating_add(i.saturating_mul(slope_per_minute)),
            duration: if i == last { plateau } else { MINUTE },
        })
        .collect();

    Ok(RatePlan { phases })
}
