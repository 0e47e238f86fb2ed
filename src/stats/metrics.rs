//! Aggregate counts over registry and correlation snapshots

use std::collections::BTreeMap;

use crate::correlation::CorrelationSnapshot;
use crate::registry::ConnectionRecord;

/// Registry-wide counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Tracked parent connections
    pub connections: usize,
    /// Tracked sessions across all parents
    pub sessions: usize,
    /// Parent connections per node
    pub parents_by_node: BTreeMap<String, usize>,
    /// Sessions per node
    pub sessions_by_node: BTreeMap<String, usize>,
    /// Parent connections per status
    pub by_status: BTreeMap<String, usize>,
}

impl RegistryStats {
    pub fn from_snapshot(records: &[ConnectionRecord]) -> Self {
        let mut stats = Self {
            connections: records.len(),
            ..Self::default()
        };

        for record in records {
            stats.sessions += record.session_count();
            *stats.parents_by_node.entry(record.node.clone()).or_insert(0) += 1;
            *stats.by_status.entry(record.status.to_string()).or_insert(0) += 1;
            for session in &record.sessions {
                *stats.sessions_by_node.entry(session.node.clone()).or_insert(0) += 1;
            }
        }

        stats
    }

    /// Node carrying the most parent connections
    ///
    /// Ties go to the node that sorts first.
    pub fn busiest_node(&self) -> Option<&str> {
        self.parents_by_node
            .iter()
            .fold(None, |best: Option<(&String, usize)>, (node, &count)| match best {
                Some((_, top)) if top >= count => best,
                _ => Some((node, count)),
            })
            .map(|(node, _)| node.as_str())
    }
}

/// Counts over one correlation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationStats {
    pub groups: usize,
    pub coherent_groups: usize,
    pub sessions: usize,
    /// Groups per declaring node
    pub groups_by_node: BTreeMap<String, usize>,
}

impl CorrelationStats {
    pub fn from_snapshot(snapshot: &CorrelationSnapshot) -> Self {
        Self {
            groups: snapshot.group_count(),
            coherent_groups: snapshot.coherent_count(),
            sessions: snapshot.session_count(),
            groups_by_node: snapshot.groups_by_node(),
        }
    }

    pub fn incoherent_groups(&self) -> usize {
        self.groups - self.coherent_groups
    }

    /// Whole-number share of coherent groups, 0 when there are none
    pub fn coherence_percent(&self) -> usize {
        self.coherent_groups * 100 / self.groups.max(1)
    }
}
