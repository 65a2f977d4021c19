//! Relay statistics

pub mod metrics;

pub use metrics::{RelayStats, RelayStatsSnapshot, SessionStats};
