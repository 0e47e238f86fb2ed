//! Correlation groups and their coherence state
//!
//! A group gathers the parent connections and sessions filed under one tag
//! handle. Coherence is recomputed after every session or parent added, so
//! the member that breaks a group is logged the moment it is seen rather than
//! only in the pass summary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::registry::{ConnectionId, ConnectionRecord, SessionRecord};
use crate::tag::GroupKey;

/// Coherence state of a group
///
/// ```text
/// Building ──add_session──► Coherent ◄──► Incoherent
/// ```
///
/// There is no terminal state; the next correlation pass rebuilds every group
/// from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// Created in the current pass, not yet verified
    Building,
    /// Every parent and session is on the declared node
    Coherent,
    /// At least one parent or session is on a different node
    Incoherent,
}

/// A parent connection filed under a group's key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub id: ConnectionId,
    pub node: String,
}

/// One parent and the sessions grouped under its tag handle
#[derive(Debug, Clone)]
pub struct Group {
    /// Group key (tag handle)
    pub id: GroupKey,

    /// Full tag of the first parent seen for this key
    pub base_tag: String,

    /// Node declared by the parent
    pub node: String,

    /// The first parent seen for this key
    pub parent: ConnectionRecord,

    /// Every parent that mapped to this key, in the order seen
    pub members: Vec<GroupMember>,

    /// Sessions gathered from all member parents
    pub sessions: Vec<SessionRecord>,

    /// When the group was created in this pass
    pub created_at: DateTime<Utc>,

    /// Last coherence recompute
    pub last_verified: Option<DateTime<Utc>>,

    state: GroupState,
}

impl Group {
    /// Create a group declared by `parent`
    pub fn new(id: GroupKey, parent: &ConnectionRecord) -> Self {
        Self {
            id,
            base_tag: parent.tag.clone(),
            node: parent.node.clone(),
            parent: parent.clone(),
            members: vec![GroupMember {
                id: parent.id,
                node: parent.node.clone(),
            }],
            sessions: Vec::new(),
            created_at: Utc::now(),
            last_verified: None,
            state: GroupState::Building,
        }
    }

    /// Current state
    pub fn state(&self) -> GroupState {
        self.state
    }

    /// Whether every parent and session resolved to the declared node
    pub fn is_coherent(&self) -> bool {
        self.state == GroupState::Coherent
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Record another parent that shares this group's key and recompute
    /// coherence
    pub(crate) fn admit(&mut self, parent: &ConnectionRecord) {
        if self.members.iter().any(|m| m.id == parent.id) {
            return;
        }

        self.members.push(GroupMember {
            id: parent.id,
            node: parent.node.clone(),
        });
        self.refresh();

        if parent.node != self.node {
            tracing::warn!(
                group = %self.id,
                connection_id = %parent.id,
                member_node = %parent.node,
                parent_node = %self.node,
                parents = ?self.parent_breakdown(),
                "Parent breaks group coherence"
            );
        }
    }

    /// Add a session and recompute coherence
    pub fn add_session(&mut self, session: SessionRecord) {
        let mismatch = session.node != self.node;
        let session_id = session.id;
        let session_node = session.node.clone();

        self.sessions.push(session);
        self.refresh();

        if mismatch {
            tracing::warn!(
                group = %self.id,
                session_id = %session_id,
                session_node = %session_node,
                parent_node = %self.node,
                breakdown = ?self.node_breakdown(),
                parents = ?self.parent_breakdown(),
                "Session breaks group coherence"
            );
        }
    }

    /// Recompute coherence on request, logging the breakdown if incoherent
    pub fn verify_coherence(&mut self) -> bool {
        self.refresh();

        if self.state == GroupState::Incoherent {
            tracing::warn!(
                group = %self.id,
                parent_node = %self.node,
                breakdown = ?self.node_breakdown(),
                parents = ?self.parent_breakdown(),
                "Group is not coherent"
            );
        }

        self.is_coherent()
    }

    /// Recompute coherence without logging
    pub(crate) fn refresh(&mut self) {
        let parents_agree = self.members.iter().all(|m| m.node == self.node);
        let sessions_agree = self.sessions.iter().all(|s| s.node == self.node);

        self.state = if parents_agree && sessions_agree {
            GroupState::Coherent
        } else {
            GroupState::Incoherent
        };
        self.last_verified = Some(Utc::now());
    }

    /// Session count per node
    pub fn node_breakdown(&self) -> BTreeMap<String, usize> {
        let mut breakdown = BTreeMap::new();
        for session in &self.sessions {
            *breakdown.entry(session.node.clone()).or_insert(0) += 1;
        }
        breakdown
    }

    /// Member parent count per node
    pub fn parent_breakdown(&self) -> BTreeMap<String, usize> {
        let mut breakdown = BTreeMap::new();
        for member in &self.members {
            *breakdown.entry(member.node.clone()).or_insert(0) += 1;
        }
        breakdown
    }

    /// Compact summary of this group
    pub fn summary(&self) -> GroupSummary {
        GroupSummary {
            id: self.id.clone(),
            node: self.node.clone(),
            parent_id: self.parent.id,
            members: self.members.len(),
            sessions: self.sessions.len(),
            coherent: self.is_coherent(),
        }
    }
}

/// Comparable one-line view of a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    pub id: GroupKey,
    pub node: String,
    pub parent_id: ConnectionId,
    /// Number of parents that share the key
    pub members: usize,
    pub sessions: usize,
    pub coherent: bool,
}

impl std::fmt::Display for GroupSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Group {}: Node={}, Parent={}, Sessions={}, Coherent={}",
            self.id, self.node, self.parent_id, self.sessions, self.coherent
        )?;
        if self.members > 1 {
            write!(f, ", Parents={}", self.members)?;
        }
        Ok(())
    }
}
