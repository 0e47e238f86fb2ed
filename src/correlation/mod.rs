//! Correlation engine and coherence verification
//!
//! A correlation pass regroups every tracked parent by the handle in its tag
//! and checks that each group's sessions all resolved to the parent's node.
//!
//! ```text
//!  registry.snapshot()
//!          │
//!          ▼
//!  extract_group_key(parent.tag) ──► Group ──add_session──► Coherent / Incoherent
//!          │
//!          ▼
//!  CorrelationSnapshot { pass, groups, tag_nodes }  ──publish──►  latest()
//! ```
//!
//! Passes are published whole. Consumers that read [`CorrelationEngine::latest`]
//! while a pass is running get the previous pass, not a partial one.

pub mod config;
pub mod engine;
pub mod group;
pub mod verdict;

pub use config::CorrelationConfig;
pub use engine::{CorrelationEngine, CorrelationSnapshot};
pub use group::{Group, GroupMember, GroupState, GroupSummary};
pub use verdict::{FailoverVerdict, GroupingVerdict};
