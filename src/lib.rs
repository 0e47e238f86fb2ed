//! # conntag-rs
//!
//! Connection-session correlation and coherence verification for clustered
//! message brokers.
//!
//! A client opens parent connections to a cluster of broker nodes and opens
//! child sessions under each parent. Every session is expected to land on its
//! parent's node. This crate records what each connection and session reports
//! about itself, regroups them by the handle embedded in their correlation
//! tags and flags any group whose sessions ended up on different nodes,
//! including across a failover.
//!
//! ## Quick Start
//!
//! ```ignore
//! use conntag_rs::{AffinityMonitor, MonitorConfig, StaticConnection, StaticSession};
//!
//! #[tokio::main]
//! async fn main() {
//!     let monitor = AffinityMonitor::new(MonitorConfig::default());
//!     let registry = monitor.registry();
//!
//!     let conn = StaticConnection::new(identifier, tag, "QM1");
//!     let parent = registry.track_connection(&conn, "APP-1").await.unwrap();
//!     registry.track_session(&StaticSession::new(tag, "QM1"), parent.id, 1).await;
//!
//!     println!("{}", monitor.correlation_report().await);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`tag`]: correlation tag and connection identifier parsing
//! - [`registry`]: tracked connections and sessions
//! - [`correlation`]: grouping passes and coherence checks
//! - [`failover`]: before/after failover audit
//! - [`report`]: text reports
//! - [`monitor`]: the operations a front door calls

pub mod correlation;
pub mod error;
pub mod failover;
pub mod monitor;
pub mod registry;
pub mod report;
pub mod stats;
pub mod tag;

pub use correlation::{
    CorrelationConfig, CorrelationEngine, CorrelationSnapshot, FailoverVerdict, Group,
    GroupMember, GroupState, GroupSummary, GroupingVerdict,
};
pub use error::{Error, Result};
pub use failover::{FailoverAudit, AFTER_FAILOVER, AFTER_REHYDRATION, BEFORE_FAILOVER};
pub use monitor::{AffinityMonitor, MonitorConfig};
pub use registry::{
    ConnectionHandle, ConnectionId, ConnectionRecord, ConnectionRegistry, ConnectionStatus,
    RegistryConfig, SessionHandle, SessionId, SessionRecord, SessionStatus, StaticConnection,
    StaticSession,
};
pub use report::Reporter;
pub use tag::{extract_group_key, ConnectionIdentifier, GroupKey, NodeSignatures};
