//! Affinity monitor
//!
//! Owns the registry, the correlation engine and the reporter, and exposes the
//! report-returning operations a front door calls.

use std::sync::Arc;

use crate::correlation::{CorrelationEngine, GroupingVerdict};
use crate::error::Result;
use crate::monitor::config::MonitorConfig;
use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::report::{render_correlation_report, Reporter};

/// Registry, correlation engine and reporter wired together
pub struct AffinityMonitor {
    config: MonitorConfig,
    registry: Arc<ConnectionRegistry>,
    engine: Arc<CorrelationEngine>,
    reporter: Reporter,
}

impl AffinityMonitor {
    /// Create a monitor with a fresh registry
    pub fn new(config: MonitorConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::with_config(config.registry.clone()));
        Self::with_registry(config, registry)
    }

    /// Create a monitor over an existing registry
    ///
    /// The registry's own configuration is kept; `config.registry` is ignored.
    pub fn with_registry(config: MonitorConfig, registry: Arc<ConnectionRegistry>) -> Self {
        let engine = Arc::new(CorrelationEngine::with_config(
            Arc::clone(&registry),
            config.correlation.clone(),
        ));
        let reporter = Reporter::new(Arc::clone(&registry), Arc::clone(&engine));

        Self {
            config,
            registry,
            engine,
            reporter,
        }
    }

    /// Get a reference to the connection registry
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Get a reference to the correlation engine
    pub fn engine(&self) -> &Arc<CorrelationEngine> {
        &self.engine
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Run a correlation pass now and return its report
    pub async fn correlation_report(&self) -> String {
        let snapshot = self.engine.correlate().await;
        let report = render_correlation_report(&snapshot);
        tracing::info!("{}", report);
        report
    }

    /// Verify one parent's grouping
    pub async fn verify_grouping(&self, connection_id: ConnectionId) -> Result<GroupingVerdict> {
        Ok(self.engine.verify_parent_child_grouping(connection_id).await?)
    }

    /// Verify one parent's grouping and return the result as text
    pub async fn verify_grouping_report(&self, connection_id: ConnectionId) -> String {
        self.reporter.grouping_report(connection_id).await
    }

    /// Current connection and session table
    pub async fn connection_report(&self) -> String {
        self.reporter.connection_table().await
    }

    /// Report for the most recently published pass
    pub async fn latest_correlation_report(&self) -> String {
        self.reporter.latest_correlation_report().await
    }

    /// Spawn the recurring correlation pass
    pub fn spawn_correlation_task(&self) -> tokio::task::JoinHandle<()> {
        self.engine.spawn_correlation_task()
    }

    /// Run the recurring correlation pass until `shutdown` completes
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: std::future::Future<Output = ()>,
    {
        tracing::info!(
            interval_ms = self.config.correlation.interval.as_millis() as u64,
            "Affinity monitor running"
        );

        let mut correlation_handle = self.spawn_correlation_task();

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
            }
            result = &mut correlation_handle => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Correlation task stopped");
                }
            }
        }

        correlation_handle.abort();

        if self.config.report_on_shutdown {
            tracing::info!("{}", self.latest_correlation_report().await);
        }
    }
}
