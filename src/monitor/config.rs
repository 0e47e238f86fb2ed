//! Monitor configuration

use std::time::Duration;

use crate::correlation::CorrelationConfig;
use crate::registry::RegistryConfig;
use crate::tag::NodeSignatures;

/// Configuration for an [`AffinityMonitor`](super::AffinityMonitor)
#[derive(Debug, Clone, Default)]
pub struct MonitorConfig {
    /// Registry settings
    pub registry: RegistryConfig,

    /// Correlation settings
    pub correlation: CorrelationConfig,

    /// Log the correlation report at shutdown
    pub report_on_shutdown: bool,
}

impl MonitorConfig {
    /// Create a config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the registry configuration
    pub fn registry(mut self, config: RegistryConfig) -> Self {
        self.registry = config;
        self
    }

    /// Set the correlation configuration
    pub fn correlation(mut self, config: CorrelationConfig) -> Self {
        self.correlation = config;
        self
    }

    /// Set the identifier signature table
    pub fn node_signatures(mut self, signatures: NodeSignatures) -> Self {
        self.registry = self.registry.node_signatures(signatures);
        self
    }

    /// Set the time between scheduled correlation passes
    pub fn correlation_interval(mut self, interval: Duration) -> Self {
        self.correlation = self.correlation.interval(interval);
        self
    }

    /// Log the final correlation report when `run_until` returns
    pub fn report_on_shutdown(mut self, enabled: bool) -> Self {
        self.report_on_shutdown = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.correlation.interval, Duration::from_secs(10));
        assert_eq!(config.registry.node_signatures.len(), 3);
        assert!(!config.report_on_shutdown);
    }

    #[test]
    fn test_builder_pattern() {
        let config = MonitorConfig::new()
            .node_signatures(NodeSignatures::empty().with_node("NODE1").with_node("NODE2"))
            .correlation_interval(Duration::from_secs(2))
            .report_on_shutdown(true);

        assert_eq!(config.registry.node_signatures.len(), 2);
        assert_eq!(config.correlation.interval, Duration::from_secs(2));
        assert!(config.report_on_shutdown);
    }
}
