//! stairload - staircase ramp-up HTTP load generator
//!
//! stairload attacks a fixed set of HTTP targets at a rate that climbs by a fixed
//! slope every minute and then holds a plateau, while a background exporter
//! appends schema-stable metrics snapshots to a file for live plotting.
//!
//! # Architecture
//!
//! - **Targets**: line-delimited JSON request templates, loaded once into a catalog
//! - **Schedule**: pure conversion of ramp parameters into an ordered rate plan
//! - **Engines**: pluggable attack engines (HTTP, mock) that run one phase at a time
//! - **Driver**: sequential phase loop that drains each phase into the aggregator
//! - **Stats**: lock-guarded metrics aggregator plus the periodic snapshot exporter
//! - **Output**: final text and JSON reports

pub mod config;
pub mod driver;
pub mod engine;
pub mod output;
pub mod schedule;
pub mod stats;
pub mod target;
pub mod util;

// Re-export commonly used types
pub use config::Config;
pub use engine::AttackEngine;
pub use schedule::{compute_plan, Phase, RatePlan};
pub use stats::MetricsAggregator;

/// Result type used throughout stairload
pub type Result<T> = anyhow::Result<T>;
