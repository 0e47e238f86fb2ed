//! Connection registry
//!
//! The registry is the only persistent shared state in the crate. Whatever
//! opens broker connections calls [`ConnectionRegistry::track_connection`] for
//! each parent and [`ConnectionRegistry::track_session`] for each session it
//! opens under that parent. The correlation engine and reporter only ever read
//! point-in-time snapshots.
//!
//! # Architecture
//!
//! ```text
//!                      Arc<ConnectionRegistry>
//!              ┌──────────────────────────────────────┐
//!              │ connections: HashMap<ConnectionId,   │
//!              │   Arc<RwLock<ConnectionRecord {      │
//!              │     identifier, tag, node, status,   │
//!              │     sessions: Vec<SessionRecord>,    │
//!              │   }>>                                │
//!              │ >                                    │
//!              └──────────────────┬───────────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!  track_connection()      track_session()           snapshot()
//!  (connection setup)      (per session)             (engine, reporter)
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod handle;
pub mod store;

pub use config::{RegistryConfig, UNKNOWN};
pub use entry::{
    AcknowledgeMode, ConnectionId, ConnectionRecord, ConnectionStatus, SessionId, SessionRecord,
    SessionStatus,
};
pub use error::RegistryError;
pub use handle::{ConnectionHandle, HandleError, SessionHandle, StaticConnection, StaticSession};
pub use store::ConnectionRegistry;
