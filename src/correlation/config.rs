//! Correlation configuration

use std::time::Duration;

/// Default time between scheduled correlation passes
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Configuration for the correlation engine
#[derive(Debug, Clone)]
pub struct CorrelationConfig {
    /// Time between scheduled passes
    pub interval: Duration,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl CorrelationConfig {
    /// Set the pass interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}
