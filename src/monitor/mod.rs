//! Affinity monitor
//!
//! The surface a REST or CLI front door consumes. Every operation returns the
//! rendered text report.

pub mod config;
pub mod service;

pub use config::MonitorConfig;
pub use service::AffinityMonitor;
