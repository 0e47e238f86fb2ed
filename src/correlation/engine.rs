//! Correlation engine
//!
//! Each pass copies the registry, regroups every parent by the key derived
//! from its tag and files the parent's sessions into that group. Groups are
//! never patched between passes; a pass always starts from an empty map.
//!
//! A pass builds its map privately and publishes it with one write, so a
//! reader sees either the previous pass or the new one, never a half-built
//! map. A pass that finishes after a newer one has already been published is
//! returned to its caller but not published.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;

use super::config::CorrelationConfig;
use super::group::{Group, GroupSummary};
use super::verdict::{FailoverVerdict, GroupingVerdict};
use crate::registry::{ConnectionId, ConnectionRegistry, RegistryError};
use crate::tag::{extract_group_key, group_key_or_unknown, GroupKey};

/// Result of one correlation pass
#[derive(Debug, Clone)]
pub struct CorrelationSnapshot {
    /// Pass number, 0 for the empty snapshot published before any pass
    pub pass: u64,

    /// When the pass finished
    pub completed_at: DateTime<Utc>,

    /// How long the pass took
    pub duration: Duration,

    /// Groups keyed by tag handle
    pub groups: BTreeMap<GroupKey, Group>,

    /// Node each session tag resolved to
    pub tag_nodes: BTreeMap<String, String>,
}

impl CorrelationSnapshot {
    /// Snapshot with no groups
    pub fn empty() -> Self {
        Self {
            pass: 0,
            completed_at: Utc::now(),
            duration: Duration::ZERO,
            groups: BTreeMap::new(),
            tag_nodes: BTreeMap::new(),
        }
    }

    pub fn group(&self, key: &GroupKey) -> Option<&Group> {
        self.groups.get(key)
    }

    /// Summaries of every group, ordered by key
    pub fn summaries(&self) -> Vec<GroupSummary> {
        self.groups.values().map(Group::summary).collect()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn coherent_count(&self) -> usize {
        self.groups.values().filter(|g| g.is_coherent()).count()
    }

    /// Groups that failed the coherence check
    pub fn incoherent(&self) -> impl Iterator<Item = &Group> {
        self.groups.values().filter(|g| !g.is_coherent())
    }

    pub fn session_count(&self) -> usize {
        self.groups.values().map(Group::session_count).sum()
    }

    /// Number of groups declared by each node
    pub fn groups_by_node(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for group in self.groups.values() {
            *counts.entry(group.node.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Regroups tracked connections and verifies their coherence
pub struct CorrelationEngine {
    registry: Arc<ConnectionRegistry>,

    config: CorrelationConfig,

    /// Most recently published pass
    latest: RwLock<Arc<CorrelationSnapshot>>,

    next_pass: AtomicU64,
}

impl CorrelationEngine {
    /// Create an engine over `registry` with default configuration
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self::with_config(registry, CorrelationConfig::default())
    }

    pub fn with_config(registry: Arc<ConnectionRegistry>, config: CorrelationConfig) -> Self {
        Self {
            registry,
            config,
            latest: RwLock::new(Arc::new(CorrelationSnapshot::empty())),
            next_pass: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    /// Run one correlation pass and publish it
    ///
    /// Sessions tracked after the registry snapshot is taken are not part of
    /// this pass.
    pub async fn correlate(&self) -> Arc<CorrelationSnapshot> {
        let pass = self.next_pass.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let records = self.registry.snapshot().await;

        let mut groups: BTreeMap<GroupKey, Group> = BTreeMap::new();
        let mut tag_nodes = BTreeMap::new();

        for parent in &records {
            let key = extract_group_key(&parent.tag).unwrap_or_else(|e| {
                tracing::debug!(
                    connection_id = %parent.id,
                    tag = %parent.tag,
                    error = %e,
                    "Filing parent under unknown group"
                );
                GroupKey::unknown()
            });

            let group = groups
                .entry(key.clone())
                .or_insert_with(|| Group::new(key, parent));
            group.admit(parent);

            for session in &parent.sessions {
                tag_nodes.insert(session.tag.clone(), session.node.clone());
                group.add_session(session.clone());
            }
        }

        for group in groups.values_mut() {
            group.refresh();
        }

        let snapshot = Arc::new(CorrelationSnapshot {
            pass,
            completed_at: Utc::now(),
            duration: started.elapsed(),
            groups,
            tag_nodes,
        });

        let published = self.publish(Arc::clone(&snapshot)).await;

        tracing::info!(
            pass = pass,
            connections = records.len(),
            groups = snapshot.group_count(),
            coherent = snapshot.coherent_count(),
            sessions = snapshot.session_count(),
            elapsed_ms = snapshot.duration.as_millis() as u64,
            published = published,
            "Correlation pass complete"
        );

        snapshot
    }

    /// Replace the published pass if `snapshot` is newer
    async fn publish(&self, snapshot: Arc<CorrelationSnapshot>) -> bool {
        let mut latest = self.latest.write().await;
        if snapshot.pass <= latest.pass {
            tracing::debug!(
                pass = snapshot.pass,
                published = latest.pass,
                "Discarding stale correlation pass"
            );
            return false;
        }
        *latest = snapshot;
        true
    }

    /// Most recently published pass
    pub async fn latest(&self) -> Arc<CorrelationSnapshot> {
        Arc::clone(&*self.latest.read().await)
    }

    /// Check that every session of one parent resolved to a single node
    pub async fn verify_parent_child_grouping(
        &self,
        connection_id: ConnectionId,
    ) -> Result<GroupingVerdict, RegistryError> {
        let parent = self
            .registry
            .get(connection_id)
            .await
            .ok_or(RegistryError::ConnectionNotFound(connection_id))?;

        let verdict = GroupingVerdict::from_record(&parent);

        if verdict.is_success() {
            tracing::info!(
                connection_id = %connection_id,
                node = %parent.node,
                sessions = verdict.session_count,
                "All sessions share one node"
            );
        } else if verdict.session_count == 0 {
            tracing::warn!(connection_id = %connection_id, "Parent has no sessions to verify");
        } else {
            tracing::error!(
                connection_id = %connection_id,
                parent_node = %parent.node,
                partitions = ?verdict.partitions,
                "Sessions are split across nodes"
            );
        }
        tracing::info!(
            connection_id = %connection_id,
            tags = ?verdict.distinct_tags,
            "Distinct session tags"
        );

        Ok(verdict)
    }

    /// Compare the groups for a pre-failover and a post-failover tag
    ///
    /// Reads the published pass; run [`correlate`](Self::correlate) first if
    /// the registry changed since.
    pub async fn compare_failover(&self, before_tag: &str, after_tag: &str) -> FailoverVerdict {
        let before = group_key_or_unknown(Some(before_tag));
        let after = group_key_or_unknown(Some(after_tag));
        let latest = self.latest().await;

        let verdict = match (latest.group(&before), latest.group(&after)) {
            (Some(b), Some(a)) if b.session_count() == a.session_count() => {
                FailoverVerdict::Coherent {
                    sessions: b.session_count(),
                    before,
                    after,
                }
            }
            (Some(b), Some(a)) => FailoverVerdict::CountMismatch {
                before_sessions: b.session_count(),
                after_sessions: a.session_count(),
                before,
                after,
            },
            (b, a) => FailoverVerdict::MissingGroup {
                before_found: b.is_some(),
                after_found: a.is_some(),
                before,
                after,
            },
        };

        if verdict.is_success() {
            tracing::info!(verdict = %verdict, "Failover coherence verified");
        } else {
            tracing::warn!(verdict = %verdict, "Failover coherence not verified");
        }

        verdict
    }

    /// Whether the before and after groups hold the same number of sessions
    pub async fn verify_failover_coherence(&self, before_tag: &str, after_tag: &str) -> bool {
        self.compare_failover(before_tag, after_tag)
            .await
            .is_success()
    }

    /// Spawn the recurring correlation pass
    ///
    /// Passes run one after another in the spawned task; a tick that comes
    /// due while a pass is still running is skipped.
    pub fn spawn_correlation_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let engine = Arc::clone(self);
        let period = engine.config.interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                engine.correlate().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ConnectionRecord, StaticConnection, StaticSession};
    use tokio_test::{assert_err, assert_ok};

    const TAG: &str = "MQCT1234567890ABCDEFNODE1_100";
    const KEY: &str = "1234567890ABCDEF";

    async fn parent(registry: &ConnectionRegistry, tag: &str, node: &str) -> ConnectionRecord {
        let handle = StaticConnection::new("0000000000000000000000000000000000000000000000AA", tag, node);
        registry.track_connection(&handle, "APP").await.unwrap()
    }

    async fn sessions(registry: &ConnectionRegistry, conn: ConnectionId, tag: &str, nodes: &[&str]) {
        for (i, node) in nodes.iter().enumerate() {
            registry
                .track_session(&StaticSession::new(tag, *node), conn, i as u32 + 1)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_coherent_group() {
        let registry = Arc::new(ConnectionRegistry::new());
        let conn = parent(&registry, TAG, "NODE1").await;
        sessions(&registry, conn.id, TAG, &["NODE1", "NODE1", "NODE1"]).await;

        let engine = CorrelationEngine::new(Arc::clone(&registry));
        let snapshot = engine.correlate().await;

        assert_eq!(snapshot.group_count(), 1);
        let group = snapshot.group(&GroupKey::new(KEY)).unwrap();
        assert!(group.is_coherent());
        assert_eq!(group.session_count(), 3);
        assert_eq!(group.node, "NODE1");
        assert_eq!(snapshot.tag_nodes.get(TAG).map(String::as_str), Some("NODE1"));
    }

    #[tokio::test]
    async fn test_split_session_breaks_coherence() {
        let registry = Arc::new(ConnectionRegistry::new());
        let conn = parent(&registry, TAG, "NODE1").await;
        sessions(&registry, conn.id, TAG, &["NODE1", "NODE1", "NODE2"]).await;

        let engine = CorrelationEngine::new(Arc::clone(&registry));
        let snapshot = engine.correlate().await;

        let group = snapshot.group(&GroupKey::new(KEY)).unwrap();
        assert!(!group.is_coherent());
        assert_eq!(snapshot.incoherent().count(), 1);

        let verdict = assert_ok!(engine.verify_parent_child_grouping(conn.id).await);
        assert!(!verdict.is_success());
        assert_eq!(verdict.partitions.len(), 2);
    }

    #[tokio::test]
    async fn test_grouping_unknown_connection() {
        let engine = CorrelationEngine::new(Arc::new(ConnectionRegistry::new()));

        let err = assert_err!(engine.verify_parent_child_grouping(ConnectionId(9)).await);
        assert!(matches!(err, RegistryError::ConnectionNotFound(ConnectionId(9))));
    }

    #[tokio::test]
    async fn test_failover_counts() {
        let before = "MQCT1111111111111111NODE1_100";
        let after = "MQCT2222222222222222NODE2_200";
        let short = "MQCT3333333333333333NODE2_300";

        let registry = Arc::new(ConnectionRegistry::new());
        let b = parent(&registry, before, "NODE1").await;
        sessions(&registry, b.id, before, &["NODE1", "NODE1", "NODE1"]).await;
        let a = parent(&registry, after, "NODE2").await;
        sessions(&registry, a.id, after, &["NODE2", "NODE2", "NODE2"]).await;
        let s = parent(&registry, short, "NODE2").await;
        sessions(&registry, s.id, short, &["NODE2", "NODE2"]).await;

        let engine = CorrelationEngine::new(Arc::clone(&registry));
        engine.correlate().await;

        assert!(engine.verify_failover_coherence(before, after).await);
        assert!(!engine.verify_failover_coherence(before, short).await);
        assert!(matches!(
            engine.compare_failover(before, short).await,
            FailoverVerdict::CountMismatch {
                before_sessions: 3,
                after_sessions: 2,
                ..
            }
        ));
        assert!(matches!(
            engine.compare_failover(before, "MQCT9999999999999999NODE3_1").await,
            FailoverVerdict::MissingGroup {
                before_found: true,
                after_found: false,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_failover_before_any_pass_is_missing() {
        let engine = CorrelationEngine::new(Arc::new(ConnectionRegistry::new()));
        assert!(!engine.verify_failover_coherence(TAG, TAG).await);
    }

    #[tokio::test]
    async fn test_correlate_is_idempotent() {
        let registry = Arc::new(ConnectionRegistry::new());
        let one = parent(&registry, TAG, "NODE1").await;
        sessions(&registry, one.id, TAG, &["NODE1", "NODE2"]).await;
        let two = parent(&registry, "MQCTAAAAAAAAAAAAAAAANODE2_5", "NODE2").await;
        sessions(&registry, two.id, "MQCTAAAAAAAAAAAAAAAANODE2_5", &["NODE2"]).await;

        let engine = CorrelationEngine::new(Arc::clone(&registry));
        let first = engine.correlate().await;
        let second = engine.correlate().await;

        assert_eq!(first.summaries(), second.summaries());
        assert_eq!(second.pass, first.pass + 1);
    }

    #[tokio::test]
    async fn test_parents_sharing_a_key_share_a_group() {
        let registry = Arc::new(ConnectionRegistry::new());
        let one = parent(&registry, TAG, "NODE1").await;
        sessions(&registry, one.id, TAG, &["NODE1"]).await;
        let two = parent(&registry, "MQCT1234567890ABCDEFNODE1_999", "NODE1").await;
        sessions(&registry, two.id, TAG, &["NODE1", "NODE1"]).await;

        let engine = CorrelationEngine::new(Arc::clone(&registry));
        let snapshot = engine.correlate().await;

        let group = snapshot.group(&GroupKey::new(KEY)).unwrap();
        let members: Vec<ConnectionId> = group.members.iter().map(|m| m.id).collect();
        assert_eq!(members, vec![one.id, two.id]);
        assert_eq!(group.parent.id, one.id);
        assert_eq!(group.session_count(), 3);
    }

    #[tokio::test]
    async fn test_parents_on_different_nodes_make_a_group_incoherent() {
        let registry = Arc::new(ConnectionRegistry::new());
        let one = parent(&registry, TAG, "NODE1").await;
        let two = parent(&registry, "MQCT1234567890ABCDEFNODE2_7", "NODE2").await;

        let engine = CorrelationEngine::new(Arc::clone(&registry));
        let snapshot = engine.correlate().await;

        let group = snapshot.group(&GroupKey::new(KEY)).unwrap();
        assert_eq!(group.members.len(), 2);
        assert_eq!(group.members[1].id, two.id);
        assert_eq!(group.members[1].node, "NODE2");
        assert_eq!(group.session_count(), 0);
        assert!(!group.is_coherent());

        let summary = group.summary();
        assert_eq!(summary.parent_id, one.id);
        assert!(!summary.coherent);
        assert_eq!(summary.members, 2);
    }

    #[tokio::test]
    async fn test_untagged_parent_goes_to_unknown_group() {
        let registry = Arc::new(ConnectionRegistry::new());
        let handle = StaticConnection {
            identifier: Some("ABCD".to_string()),
            resolved_node: Some("NODE1".to_string()),
            ..Default::default()
        };
        registry.track_connection(&handle, "APP").await.unwrap();

        let engine = CorrelationEngine::new(Arc::clone(&registry));
        let snapshot = engine.correlate().await;

        let group = snapshot.group(&GroupKey::unknown()).unwrap();
        assert!(group.is_coherent());
        assert_eq!(group.session_count(), 0);
    }

    #[tokio::test]
    async fn test_pass_ignores_later_sessions() {
        let registry = Arc::new(ConnectionRegistry::new());
        let conn = parent(&registry, TAG, "NODE1").await;
        sessions(&registry, conn.id, TAG, &["NODE1"]).await;

        let engine = CorrelationEngine::new(Arc::clone(&registry));
        let snapshot = engine.correlate().await;
        registry
            .track_session(&StaticSession::new(TAG, "NODE1"), conn.id, 2)
            .await
            .unwrap();

        assert_eq!(snapshot.session_count(), 1);
        assert_eq!(engine.latest().await.session_count(), 1);
        assert_eq!(engine.correlate().await.session_count(), 2);
    }

    #[tokio::test]
    async fn test_stale_pass_is_not_published() {
        let registry = Arc::new(ConnectionRegistry::new());
        parent(&registry, TAG, "NODE1").await;

        let engine = CorrelationEngine::new(Arc::clone(&registry));
        engine.correlate().await;
        engine.correlate().await;
        assert_eq!(engine.latest().await.pass, 2);

        let mut stale = CorrelationSnapshot::empty();
        stale.pass = 1;
        assert!(!engine.publish(Arc::new(stale)).await);
        assert_eq!(engine.latest().await.pass, 2);
        assert_eq!(engine.latest().await.group_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_passes_publish_newest() {
        let registry = Arc::new(ConnectionRegistry::new());
        let conn = parent(&registry, TAG, "NODE1").await;
        sessions(&registry, conn.id, TAG, &["NODE1", "NODE1"]).await;

        let engine = Arc::new(CorrelationEngine::new(Arc::clone(&registry)));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move { engine.correlate().await.pass }));
        }
        let mut highest = 0;
        for handle in handles {
            highest = highest.max(handle.await.unwrap());
        }

        let latest = engine.latest().await;
        assert_eq!(latest.pass, highest);
        assert_eq!(latest.session_count(), 2);
    }

    #[tokio::test]
    async fn test_scheduled_pass_runs() {
        let registry = Arc::new(ConnectionRegistry::new());
        parent(&registry, TAG, "NODE1").await;

        let config = CorrelationConfig::default().interval(Duration::from_millis(10));
        let engine = Arc::new(CorrelationEngine::with_config(Arc::clone(&registry), config));

        let handle = engine.spawn_correlation_task();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        let latest = engine.latest().await;
        assert!(latest.pass >= 1);
        assert_eq!(latest.group_count(), 1);
    }
}
