//! Outcomes of the one-shot verification checks

use std::collections::{BTreeMap, BTreeSet};

use crate::registry::{ConnectionId, ConnectionRecord};
use crate::tag::{GroupKey, TagParts};

/// Result of checking one parent's sessions against each other
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupingVerdict {
    pub connection_id: ConnectionId,
    pub parent_node: String,
    pub parent_tag: String,
    pub session_count: usize,
    /// Session count per resolved node
    pub partitions: BTreeMap<String, usize>,
    /// Every distinct tag reported by the sessions
    pub distinct_tags: BTreeSet<String>,
}

impl GroupingVerdict {
    /// Partition a parent's sessions by node and collect their tags
    pub fn from_record(parent: &ConnectionRecord) -> Self {
        let mut partitions = BTreeMap::new();
        let mut distinct_tags = BTreeSet::new();

        for session in &parent.sessions {
            *partitions.entry(session.node.clone()).or_insert(0) += 1;
            distinct_tags.insert(session.tag.clone());
        }

        Self {
            connection_id: parent.id,
            parent_node: parent.node.clone(),
            parent_tag: parent.tag.clone(),
            session_count: parent.sessions.len(),
            partitions,
            distinct_tags,
        }
    }

    /// All sessions sit in exactly one node partition
    pub fn is_success(&self) -> bool {
        self.partitions.len() == 1
    }

    /// The single partition is the parent's own node
    pub fn shares_parent_node(&self) -> bool {
        self.is_success() && self.partitions.contains_key(&self.parent_node)
    }

    /// Every session reported exactly the parent's tag
    pub fn tags_match_parent(&self) -> bool {
        self.distinct_tags.len() == 1 && self.distinct_tags.contains(&self.parent_tag)
    }
}

impl std::fmt::Display for GroupingVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Parent-Child Grouping Verification ===")?;
        writeln!(f, "Parent Connection: {}", self.connection_id)?;
        writeln!(f, "Parent Node: {}", self.parent_node)?;
        writeln!(f, "Parent Tag: {}", self.parent_tag)?;

        if let Ok(parts) = TagParts::parse(&self.parent_tag) {
            writeln!(
                f,
                "  Handle: {}  Node hint: {}",
                parts.handle,
                parts.node_hint().unwrap_or("-")
            )?;
        }

        match self.partitions.keys().next() {
            Some(node) if self.is_success() => writeln!(
                f,
                "SUCCESS: All {} sessions are on the same node: {}",
                self.session_count, node
            )?,
            None => writeln!(f, "FAILURE: Parent has no sessions to verify")?,
            Some(_) => {
                writeln!(
                    f,
                    "FAILURE: Sessions are split across {} different nodes!",
                    self.partitions.len()
                )?;
                for (node, count) in &self.partitions {
                    writeln!(f, "  - Node {}: {} sessions", node, count)?;
                }
            }
        }

        writeln!(f, "Unique tags in group: {}", self.distinct_tags.len())?;
        for tag in &self.distinct_tags {
            writeln!(f, "  - {}", tag)?;
        }

        Ok(())
    }
}

/// Result of comparing the groups before and after a failover
///
/// This compares session counts only. It cannot tell "the same three sessions
/// moved together" from "three different sessions reconnected".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailoverVerdict {
    /// Both groups exist with the same number of sessions
    Coherent {
        before: GroupKey,
        after: GroupKey,
        sessions: usize,
    },
    /// Both groups exist but their session counts differ
    CountMismatch {
        before: GroupKey,
        after: GroupKey,
        before_sessions: usize,
        after_sessions: usize,
    },
    /// At least one group was not found in the latest pass
    MissingGroup {
        before: GroupKey,
        after: GroupKey,
        before_found: bool,
        after_found: bool,
    },
}

impl FailoverVerdict {
    pub fn is_success(&self) -> bool {
        matches!(self, FailoverVerdict::Coherent { .. })
    }
}

impl std::fmt::Display for FailoverVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailoverVerdict::Coherent {
                before,
                after,
                sessions,
            } => write!(
                f,
                "Failover SUCCESS: all {} sessions moved together ({} -> {})",
                sessions, before, after
            ),
            FailoverVerdict::CountMismatch {
                before,
                after,
                before_sessions,
                after_sessions,
            } => write!(
                f,
                "Failover ISSUE: session count mismatch ({} -> {}). Before: {}, After: {}",
                before, after, before_sessions, after_sessions
            ),
            FailoverVerdict::MissingGroup {
                before,
                after,
                before_found,
                after_found,
            } => write!(
                f,
                "Failover UNVERIFIED: missing group data (before {} found={}, after {} found={})",
                before, before_found, after, after_found
            ),
        }
    }
}
