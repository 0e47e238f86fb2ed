//! Statistics
//!
//! Pure aggregates over snapshots. Nothing here holds state of its own.

pub mod metrics;

pub use metrics::{CorrelationStats, RegistryStats};
