//! Connection and session record types
//!
//! Records are what the registry stores and what snapshots hand out. A
//! snapshot is a deep copy, so nothing outside the registry can change a
//! tracked record; status changes go through
//! [`ConnectionRegistry::update_status`](super::ConnectionRegistry::update_status).

use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::tag::{group_key_or_unknown, ConnectionIdentifier, GroupKey};

/// Synthetic, process-unique parent connection id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CONN-{}", self.0)
    }
}

impl FromStr for ConnectionId {
    type Err = std::num::ParseIntError;

    /// Accepts both `CONN-7` and `7`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("CONN-").unwrap_or(s);
        digits.trim().parse().map(ConnectionId)
    }
}

/// Synthetic, process-unique session id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SESSION-{}", self.0)
    }
}

/// Parent connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    Connected,
    /// Client library is reconnecting after losing its node
    Reconnecting,
    Failed,
    Closed,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionStatus::Connected => "CONNECTED",
            ConnectionStatus::Reconnecting => "RECONNECTING",
            ConnectionStatus::Failed => "FAILED",
            ConnectionStatus::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Active,
    Idle,
    Processing,
    Failed,
    Closed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Active => "ACTIVE",
            SessionStatus::Idle => "IDLE",
            SessionStatus::Processing => "PROCESSING",
            SessionStatus::Failed => "FAILED",
            SessionStatus::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}

/// Session acknowledgement mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcknowledgeMode {
    /// Acknowledgement happens on commit
    Transacted,
    Auto,
    Client,
    DupsOk,
    /// Vendor-specific code
    Other(i32),
}

impl AcknowledgeMode {
    /// Map a raw acknowledgement code
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => AcknowledgeMode::Transacted,
            1 => AcknowledgeMode::Auto,
            2 => AcknowledgeMode::Client,
            3 => AcknowledgeMode::DupsOk,
            other => AcknowledgeMode::Other(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            AcknowledgeMode::Transacted => 0,
            AcknowledgeMode::Auto => 1,
            AcknowledgeMode::Client => 2,
            AcknowledgeMode::DupsOk => 3,
            AcknowledgeMode::Other(code) => *code,
        }
    }
}

impl std::fmt::Display for AcknowledgeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcknowledgeMode::Transacted => f.write_str("SESSION_TRANSACTED"),
            AcknowledgeMode::Auto => f.write_str("AUTO_ACKNOWLEDGE"),
            AcknowledgeMode::Client => f.write_str("CLIENT_ACKNOWLEDGE"),
            AcknowledgeMode::DupsOk => f.write_str("DUPS_OK_ACKNOWLEDGE"),
            AcknowledgeMode::Other(code) => write!(f, "MODE_{}", code),
        }
    }
}

/// One tracked child session
#[derive(Debug, Clone)]
pub struct SessionRecord {
    /// Globally unique session id
    pub id: SessionId,

    /// 1-based sequence number within the parent
    pub sequence: u32,

    /// Owning parent connection
    pub parent_id: ConnectionId,

    /// Correlation tag as reported by the session
    pub tag: String,

    /// Node the session resolved to
    pub node: String,

    /// When the session was tracked
    pub created_at: DateTime<Utc>,

    /// Current status
    pub status: SessionStatus,

    /// Thread that opened the session
    pub thread_label: String,

    /// Whether the session is transacted
    pub transacted: bool,

    /// Acknowledgement mode
    pub acknowledge_mode: AcknowledgeMode,
}

impl SessionRecord {
    /// Check if this session belongs to `connection_id`
    pub fn belongs_to(&self, connection_id: ConnectionId) -> bool {
        self.parent_id == connection_id
    }

    /// Stable key combining parent, tag and sequence number
    pub fn correlation_key(&self) -> String {
        format!("{}-{}-{}", self.parent_id, self.tag, self.sequence)
    }
}

/// One tracked parent connection and its sessions
#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    /// Synthetic id assigned by the registry
    pub id: ConnectionId,

    /// Broker-issued binary connection identifier
    pub identifier: ConnectionIdentifier,

    /// Broker-issued correlation tag (unknown sentinel if absent)
    pub tag: String,

    /// Caller-supplied label
    pub application_label: String,

    /// Node identity used for coherence checks
    ///
    /// Derived from the identifier signature when recognized, otherwise the
    /// node the handle resolved.
    pub node: String,

    /// Node as resolved by the client library
    pub resolved_node: String,

    pub host: String,

    pub port: u16,

    /// When the connection was tracked
    pub created_at: DateTime<Utc>,

    /// Last status change
    pub last_updated: DateTime<Utc>,

    /// Current status
    pub status: ConnectionStatus,

    /// Child sessions in insertion order
    pub sessions: Vec<SessionRecord>,
}

impl ConnectionRecord {
    /// Number of child sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Group key derived from this connection's tag
    pub fn group_key(&self) -> GroupKey {
        group_key_or_unknown(Some(&self.tag))
    }

    /// Stable key combining label, identifier and tag
    pub fn correlation_key(&self) -> String {
        format!("{}-{}-{}", self.application_label, self.identifier, self.tag)
    }

    /// Check if every session resolved to this connection's node
    pub fn sessions_share_node(&self) -> bool {
        self.sessions.iter().all(|s| s.node == self.node)
    }
}
