//! Connection registry implementation
//!
//! The central store of every parent connection and child session tracked in
//! this process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use super::config::RegistryConfig;
use super::entry::{
    AcknowledgeMode, ConnectionId, ConnectionRecord, ConnectionStatus, SessionId, SessionRecord,
    SessionStatus,
};
use super::error::RegistryError;
use super::handle::{ConnectionHandle, HandleError, SessionHandle};
use crate::tag::ConnectionIdentifier;

/// Central registry for all tracked connections
///
/// Locking discipline: the outer `RwLock` guards the map shape and is only
/// held for writing while a new connection is inserted. Each connection has
/// its own `RwLock`, so appends to one parent's session list never block
/// appends to another, and concurrent appends to the same parent serialize
/// on that parent's lock.
pub struct ConnectionRegistry {
    /// Map of connection id to record
    connections: RwLock<HashMap<ConnectionId, Arc<RwLock<ConnectionRecord>>>>,

    next_connection_id: AtomicU64,

    next_session_id: AtomicU64,

    /// Configuration
    config: RegistryConfig,
}

impl ConnectionRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_connection_id: AtomicU64::new(1),
            next_session_id: AtomicU64::new(1),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Track a new parent connection
    ///
    /// Never fails past this point: problems are logged and reported as
    /// `None` so the caller can keep using its connection.
    pub async fn track_connection<H>(&self, handle: &H, label: &str) -> Option<ConnectionRecord>
    where
        H: ConnectionHandle + ?Sized,
    {
        match self.try_track_connection(handle, label).await {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::error!(label = %label, error = %e, "Failed to track connection");
                None
            }
        }
    }

    /// Track a new parent connection, returning the cause on failure
    ///
    /// Only an unreadable identifier is fatal. Every other property falls back
    /// to the unknown sentinel.
    pub async fn try_track_connection<H>(
        &self,
        handle: &H,
        label: &str,
    ) -> Result<ConnectionRecord, RegistryError>
    where
        H: ConnectionHandle + ?Sized,
    {
        let identifier = ConnectionIdentifier::new(handle.identifier()?);
        let tag = self.tag_or_unknown(handle.correlation_tag());
        let resolved_node = self.or_unknown(handle.resolved_node());
        let host = self.or_unknown(handle.host());
        let port = handle.port().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Port unavailable, recording 0");
            0
        });

        let node = identifier
            .node_hint(&self.config.node_signatures)
            .or_else(|| resolved_node.clone());

        let id = ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed));
        let now = Utc::now();

        let record = ConnectionRecord {
            id,
            identifier,
            tag,
            application_label: label.to_string(),
            node,
            resolved_node,
            host,
            port,
            created_at: now,
            last_updated: now,
            status: ConnectionStatus::Connected,
            sessions: Vec::new(),
        };

        self.connections
            .write()
            .await
            .insert(id, Arc::new(RwLock::new(record.clone())));

        tracing::info!(
            connection_id = %id,
            identifier = %record.identifier,
            node = %record.node,
            tag = %record.tag,
            label = %label,
            "Tracked parent connection"
        );

        Ok(record)
    }

    /// Track a new child session under `parent_id`
    ///
    /// Returns `None` (and logs a warning) if the parent is not tracked.
    pub async fn track_session<H>(
        &self,
        handle: &H,
        parent_id: ConnectionId,
        sequence: u32,
    ) -> Option<SessionRecord>
    where
        H: SessionHandle + ?Sized,
    {
        match self.try_track_session(handle, parent_id, sequence).await {
            Ok(record) => Some(record),
            Err(RegistryError::UnknownParent(id)) => {
                tracing::warn!(
                    parent_id = %id,
                    sequence = sequence,
                    "Session not tracked: unknown parent connection"
                );
                None
            }
            Err(e) => {
                tracing::error!(parent_id = %parent_id, error = %e, "Failed to track session");
                None
            }
        }
    }

    /// Track a new child session, returning the cause on failure
    pub async fn try_track_session<H>(
        &self,
        handle: &H,
        parent_id: ConnectionId,
        sequence: u32,
    ) -> Result<SessionRecord, RegistryError>
    where
        H: SessionHandle + ?Sized,
    {
        let entry = self
            .entry(parent_id)
            .await
            .ok_or(RegistryError::UnknownParent(parent_id))?;

        let tag = self.tag_or_unknown(handle.correlation_tag());
        let node = self.or_unknown(handle.resolved_node());
        let thread_label = handle.thread_label().unwrap_or_else(|_| {
            std::thread::current()
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| self.config.unknown_sentinel.clone())
        });
        let transacted = handle.transacted().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Transaction mode unavailable, assuming non-transacted");
            false
        });
        let acknowledge_mode = match handle.acknowledge_mode() {
            Ok(code) => AcknowledgeMode::from_code(code),
            Err(e) => {
                tracing::warn!(error = %e, "Acknowledge mode unavailable, assuming auto");
                AcknowledgeMode::Auto
            }
        };

        let mut parent = entry.write().await;

        if let Some(last) = parent.sessions.last() {
            if sequence <= last.sequence {
                tracing::warn!(
                    parent_id = %parent_id,
                    previous = last.sequence,
                    sequence = sequence,
                    "Session sequence number did not increase"
                );
            }
        }

        let record = SessionRecord {
            id: SessionId(self.next_session_id.fetch_add(1, Ordering::Relaxed)),
            sequence,
            parent_id,
            tag,
            node,
            created_at: Utc::now(),
            status: SessionStatus::Active,
            thread_label,
            transacted,
            acknowledge_mode,
        };

        parent.sessions.push(record.clone());

        tracing::info!(
            session_id = %record.id,
            parent_id = %parent_id,
            sequence = sequence,
            node = %record.node,
            tag = %record.tag,
            label = %parent.application_label,
            thread = %record.thread_label,
            "Tracked session"
        );

        Ok(record)
    }

    /// Set a connection's status
    ///
    /// Returns `false` (no-op) if the connection is not tracked.
    pub async fn update_status(&self, id: ConnectionId, status: ConnectionStatus) -> bool {
        let Some(entry) = self.entry(id).await else {
            return false;
        };

        let mut record = entry.write().await;
        let previous = record.status;
        record.status = status;
        record.last_updated = Utc::now();

        tracing::info!(
            connection_id = %id,
            node = %record.node,
            tag = %record.tag,
            label = %record.application_label,
            from = %previous,
            to = %status,
            "Updated connection status"
        );

        true
    }

    /// Set a session's status
    ///
    /// Returns `false` if either the connection or the session is unknown.
    pub async fn update_session_status(
        &self,
        connection_id: ConnectionId,
        session_id: SessionId,
        status: SessionStatus,
    ) -> bool {
        let Some(entry) = self.entry(connection_id).await else {
            return false;
        };

        let mut guard = entry.write().await;
        let record = &mut *guard;
        let Some(session) = record.sessions.iter_mut().find(|s| s.id == session_id) else {
            return false;
        };
        let previous = session.status;
        session.status = status;

        tracing::info!(
            connection_id = %connection_id,
            session_id = %session_id,
            node = %session.node,
            tag = %session.tag,
            label = %record.application_label,
            from = %previous,
            to = %status,
            "Updated session status"
        );

        true
    }

    /// Point-in-time copy of every tracked connection, ordered by id
    ///
    /// The registry keeps mutating while the caller iterates the result.
    pub async fn snapshot(&self) -> Vec<ConnectionRecord> {
        let entries: Vec<_> = self.connections.read().await.values().cloned().collect();

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            records.push(entry.read().await.clone());
        }
        records.sort_by_key(|r| r.id);
        records
    }

    /// Copy of a single connection
    pub async fn get(&self, id: ConnectionId) -> Option<ConnectionRecord> {
        let entry = self.entry(id).await?;
        let record = entry.read().await.clone();
        Some(record)
    }

    /// Copy of a connection's session list
    pub async fn sessions_of(&self, id: ConnectionId) -> Option<Vec<SessionRecord>> {
        let entry = self.entry(id).await?;
        let sessions = entry.read().await.sessions.clone();
        Some(sessions)
    }

    /// Find a connection by its broker-issued identifier
    pub async fn find_by_identifier(&self, identifier: &str) -> Option<ConnectionRecord> {
        self.snapshot()
            .await
            .into_iter()
            .find(|r| r.identifier.as_str() == identifier)
    }

    /// Number of tracked connections
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Number of tracked sessions across all connections
    pub async fn session_count(&self) -> usize {
        self.snapshot()
            .await
            .iter()
            .map(ConnectionRecord::session_count)
            .sum()
    }

    async fn entry(&self, id: ConnectionId) -> Option<Arc<RwLock<ConnectionRecord>>> {
        self.connections.read().await.get(&id).cloned()
    }

    fn or_unknown(&self, value: Result<String, HandleError>) -> String {
        match value {
            Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
            Ok(_) => self.config.unknown_sentinel.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "Property unavailable, recording sentinel");
                self.config.unknown_sentinel.clone()
            }
        }
    }

    fn tag_or_unknown(&self, value: Result<Option<String>, HandleError>) -> String {
        match value {
            Ok(Some(tag)) => self.or_unknown(Ok(tag)),
            Ok(None) => self.config.unknown_sentinel.clone(),
            Err(e) => self.or_unknown(Err(e)),
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
