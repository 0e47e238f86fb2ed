//! Text reports
//!
//! Read-side rendering over registry snapshots and published correlation
//! passes. Rendering never changes tracked state and never starts a pass.

pub mod correlation;
pub mod table;

use std::sync::Arc;

use crate::correlation::CorrelationEngine;
use crate::registry::{ConnectionId, ConnectionRegistry, RegistryError};

pub use correlation::render_correlation_report;
pub use table::render_connection_table;

/// Renders reports from a registry and the engine that correlates it
#[derive(Clone)]
pub struct Reporter {
    registry: Arc<ConnectionRegistry>,
    engine: Arc<CorrelationEngine>,
}

impl Reporter {
    pub fn new(registry: Arc<ConnectionRegistry>, engine: Arc<CorrelationEngine>) -> Self {
        Self { registry, engine }
    }

    /// Current connection and session table
    pub async fn connection_table(&self) -> String {
        render_connection_table(&self.registry.snapshot().await)
    }

    /// Report for the most recently published pass
    pub async fn latest_correlation_report(&self) -> String {
        let snapshot = self.engine.latest().await;
        render_correlation_report(&snapshot)
    }

    /// Grouping verification for one parent
    pub async fn grouping_report(&self, connection_id: ConnectionId) -> String {
        match self.engine.verify_parent_child_grouping(connection_id).await {
            Ok(verdict) => verdict.to_string(),
            Err(e @ RegistryError::ConnectionNotFound(_)) => {
                tracing::warn!(connection_id = %connection_id, "Grouping requested for unknown connection");
                format!("{}\n", e)
            }
            Err(e) => format!("Grouping verification failed: {}\n", e),
        }
    }
}
