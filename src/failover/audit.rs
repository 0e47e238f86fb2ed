//! Failover audit recorder

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::correlation::{CorrelationEngine, CorrelationSnapshot, FailoverVerdict, GroupingVerdict};
use crate::registry::{ConnectionId, ConnectionRecord, ConnectionStatus};
use crate::report::render_connection_table;
use crate::report::table::join_counts;
use crate::stats::RegistryStats;

/// Phase name for the capture taken before a node is taken down
pub const BEFORE_FAILOVER: &str = "BEFORE_FAILOVER";

/// Phase name for the capture taken once clients have reconnected
pub const AFTER_FAILOVER: &str = "AFTER_FAILOVER";

/// Phase name for the capture taken once the failed node is back online
pub const AFTER_REHYDRATION: &str = "AFTER_REHYDRATION";

/// Registry and correlation state at one point of a failover run
#[derive(Debug, Clone)]
pub struct PhaseCapture {
    pub phase: String,
    pub captured_at: DateTime<Utc>,
    /// Rendered connection table
    pub table: String,
    /// Correlation pass run for this capture
    pub correlation: Arc<CorrelationSnapshot>,
    pub connections: Vec<ConnectionRecord>,
}

impl PhaseCapture {
    /// Node carrying the most parents at capture time
    pub fn busiest_node(&self) -> Option<String> {
        RegistryStats::from_snapshot(&self.connections)
            .busiest_node()
            .map(str::to_string)
    }

    /// Node of each label's live parent
    ///
    /// A label's live parent is its newest parent that is neither closed nor
    /// failed. Labels with no live parent are left out.
    pub fn placements(&self) -> BTreeMap<String, String> {
        let mut newest: BTreeMap<&str, &ConnectionRecord> = BTreeMap::new();
        for parent in &self.connections {
            if matches!(parent.status, ConnectionStatus::Closed | ConnectionStatus::Failed) {
                continue;
            }
            let slot = newest.entry(parent.application_label.as_str()).or_insert(parent);
            if parent.id > slot.id {
                *slot = parent;
            }
        }

        newest
            .into_iter()
            .map(|(label, parent)| (label.to_string(), parent.node.clone()))
            .collect()
    }

    /// Live parents per node
    pub fn distribution(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for node in self.placements().into_values() {
            *counts.entry(node).or_insert(0) += 1;
        }
        counts
    }
}

/// Whether one parent kept all its sessions on its own node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoherenceCheck {
    pub connection_id: ConnectionId,
    pub coherent: bool,
    pub details: String,
}

/// A parent before failover matched with its replacement after failover
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverPairing {
    pub label: String,
    pub before: ConnectionId,
    pub after: ConnectionId,
    pub verdict: FailoverVerdict,
}

/// Where the parents that left a failed node ended up once it came back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RehydrationAnalysis {
    /// Node that was taken down and brought back
    pub target: String,
    /// Labels on the target before, elsewhere after the failure and present
    /// in the final capture
    pub tracked: usize,
    /// Tracked labels back on the target in the final capture
    pub moved_back: usize,
    /// Tracked labels still away from the target in the final capture
    pub stayed_on_failover: usize,
}

impl RehydrationAnalysis {
    /// Compare label placements across the three captures
    pub fn from_phases(
        target: &str,
        before: &PhaseCapture,
        after: &PhaseCapture,
        final_phase: &PhaseCapture,
    ) -> Self {
        let after_nodes = after.placements();
        let final_nodes = final_phase.placements();

        let mut analysis = Self {
            target: target.to_string(),
            tracked: 0,
            moved_back: 0,
            stayed_on_failover: 0,
        };

        for (label, node) in before.placements() {
            if node != target {
                continue;
            }
            let (Some(moved_to), Some(ended_on)) = (after_nodes.get(&label), final_nodes.get(&label))
            else {
                continue;
            };
            if moved_to == target {
                continue;
            }

            analysis.tracked += 1;
            if ended_on == target {
                analysis.moved_back += 1;
            } else {
                analysis.stayed_on_failover += 1;
            }
        }

        analysis
    }

    /// At least one parent returned to the rehydrated node
    pub fn rebalanced(&self) -> bool {
        self.moved_back > 0
    }
}

impl std::fmt::Display for RehydrationAnalysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Connections rebalanced after rehydration: {}",
            if self.rebalanced() { "YES" } else { "NO" }
        )?;
        writeln!(f, "Connections moved back to {}: {}", self.target, self.moved_back)?;
        writeln!(f, "Connections stayed on failover nodes: {}", self.stayed_on_failover)?;

        if self.rebalanced() {
            writeln!(
                f,
                "REBALANCED: some connections moved back to {} after it came back online",
                self.target
            )
        } else {
            writeln!(
                f,
                "NO REBALANCING: connections stayed on their failover nodes after {} came back",
                self.target
            )
        }
    }
}

/// Records one failover run: phase captures, failure events and checks
#[derive(Debug)]
pub struct FailoverAudit {
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    captures: Vec<PhaseCapture>,
    failure_events: Vec<String>,
    checks: BTreeMap<ConnectionId, CoherenceCheck>,
    pairings: Vec<FailoverPairing>,
    /// Steps that could not be verified (missing captures, unpaired labels)
    unverified: Vec<String>,
    rehydration: Option<RehydrationAnalysis>,
}

impl FailoverAudit {
    /// Start a run now
    pub fn begin() -> Self {
        tracing::info!("Starting failover audit");
        Self {
            started_at: Utc::now(),
            finished_at: None,
            captures: Vec::new(),
            failure_events: Vec::new(),
            checks: BTreeMap::new(),
            pairings: Vec::new(),
            unverified: Vec::new(),
            rehydration: None,
        }
    }

    /// Run a correlation pass and store it with the connection table
    ///
    /// A later capture under the same phase name replaces the earlier one.
    pub async fn capture(&mut self, phase: &str, engine: &CorrelationEngine) -> &PhaseCapture {
        tracing::info!(phase = %phase, "Capturing connection state");

        let correlation = engine.correlate().await;
        let connections = engine.registry().snapshot().await;
        let table = render_connection_table(&connections);
        tracing::info!("{}", table);

        self.captures.retain(|c| c.phase != phase);
        self.captures.push(PhaseCapture {
            phase: phase.to_string(),
            captured_at: Utc::now(),
            table,
            correlation,
            connections,
        });

        &self.captures[self.captures.len() - 1]
    }

    /// Capture stored under `phase`
    pub fn phase(&self, phase: &str) -> Option<&PhaseCapture> {
        self.captures.iter().find(|c| c.phase == phase)
    }

    /// Note something that was done to provoke a failover
    pub fn record_failure_event(&mut self, event: impl Into<String>) {
        let event = event.into();
        tracing::warn!(event = %event, "Failure event");
        self.failure_events.push(event);
    }

    /// Check every tracked parent for sessions on a foreign node
    ///
    /// Returns the number of coherent parents.
    pub async fn verify_connections(&mut self, engine: &CorrelationEngine) -> usize {
        tracing::info!("Verifying parent-child coherence");

        for parent in engine.registry().snapshot().await {
            let check = match engine.verify_parent_child_grouping(parent.id).await {
                Ok(verdict) => coherence_check(&verdict),
                Err(e) => CoherenceCheck {
                    connection_id: parent.id,
                    coherent: false,
                    details: format!("Grouping unavailable: {}", e),
                },
            };
            self.checks.insert(parent.id, check);
        }

        self.checks.values().filter(|c| c.coherent).count()
    }

    /// Pair parents across two captured phases and compare their groups
    ///
    /// Parents are paired by application label. A label whose parent was
    /// replaced pairs the old parent with the newest live replacement; a label
    /// whose parent survived pairs it with itself. A missing capture or a
    /// label with no parent in the later phase is recorded as unverified and
    /// fails the run.
    pub async fn pair_failover(
        &mut self,
        engine: &CorrelationEngine,
        before_phase: &str,
        after_phase: &str,
    ) -> usize {
        let (Some(before), Some(after)) = (self.phase(before_phase), self.phase(after_phase))
        else {
            tracing::warn!(
                before = %before_phase,
                after = %after_phase,
                "Cannot pair failover phases: capture missing"
            );
            let missing = self.missing_phases(&[before_phase, after_phase]);
            self.unverified
                .push(format!("Failover pairing skipped: no capture for {}", missing));
            return 0;
        };

        let mut candidates = Vec::new();
        let mut unpaired = Vec::new();
        for old in &before.connections {
            let replacement = after
                .connections
                .iter()
                .filter(|c| c.application_label == old.application_label)
                .filter(|c| !matches!(c.status, ConnectionStatus::Closed | ConnectionStatus::Failed))
                .filter(|c| c.id == old.id || c.created_at >= before.captured_at)
                .max_by_key(|c| c.id);

            match replacement {
                Some(new) => candidates.push((
                    old.application_label.clone(),
                    old.id,
                    old.tag.clone(),
                    new.id,
                    new.tag.clone(),
                )),
                None => {
                    tracing::warn!(
                        label = %old.application_label,
                        connection_id = %old.id,
                        "No parent after failover for label"
                    );
                    unpaired.push(format!(
                        "{} ({}): no parent in {}",
                        old.application_label, old.id, after_phase
                    ));
                }
            }
        }
        self.unverified.extend(unpaired);

        for (label, before_id, before_tag, after_id, after_tag) in candidates {
            let verdict = engine.compare_failover(&before_tag, &after_tag).await;
            self.pairings.push(FailoverPairing {
                label,
                before: before_id,
                after: after_id,
                verdict,
            });
        }

        self.pairings.iter().filter(|p| p.verdict.is_success()).count()
    }

    /// Compare where parents sat before the failure, after it and once the
    /// failed node `target` came back
    ///
    /// A missing capture is recorded as unverified and yields `None`.
    pub fn analyze_rehydration(
        &mut self,
        target: &str,
        before_phase: &str,
        after_phase: &str,
        final_phase: &str,
    ) -> Option<&RehydrationAnalysis> {
        let (Some(before), Some(after), Some(last)) = (
            self.phase(before_phase),
            self.phase(after_phase),
            self.phase(final_phase),
        ) else {
            let missing = self.missing_phases(&[before_phase, after_phase, final_phase]);
            tracing::warn!(missing = %missing, "Cannot analyze rehydration: capture missing");
            self.unverified
                .push(format!("Rehydration analysis skipped: no capture for {}", missing));
            return None;
        };

        let analysis = RehydrationAnalysis::from_phases(target, before, after, last);
        tracing::info!(
            target = %target,
            tracked = analysis.tracked,
            moved_back = analysis.moved_back,
            stayed = analysis.stayed_on_failover,
            rebalanced = analysis.rebalanced(),
            "Rehydration analyzed"
        );

        self.rehydration = Some(analysis);
        self.rehydration.as_ref()
    }

    /// Close the run
    pub fn finish(&mut self) {
        let finished_at = Utc::now();
        self.finished_at = Some(finished_at);
        tracing::info!(
            success = self.is_success(),
            checks = self.checks.len(),
            pairings = self.pairings.len(),
            failure_events = self.failure_events.len(),
            "Failover audit complete"
        );
    }

    /// At least one check ran, every check and pairing succeeded and nothing
    /// was left unverified
    pub fn is_success(&self) -> bool {
        let ran = !self.checks.is_empty() || !self.pairings.is_empty();
        ran && self.unverified.is_empty()
            && self.checks.values().all(|c| c.coherent)
            && self.pairings.iter().all(|p| p.verdict.is_success())
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn failure_events(&self) -> &[String] {
        &self.failure_events
    }

    pub fn checks(&self) -> impl Iterator<Item = &CoherenceCheck> {
        self.checks.values()
    }

    pub fn pairings(&self) -> &[FailoverPairing] {
        &self.pairings
    }

    pub fn unverified(&self) -> &[String] {
        &self.unverified
    }

    pub fn rehydration(&self) -> Option<&RehydrationAnalysis> {
        self.rehydration.as_ref()
    }

    fn missing_phases(&self, phases: &[&str]) -> String {
        let missing: Vec<&str> = phases
            .iter()
            .copied()
            .filter(|p| self.phase(p).is_none())
            .collect();
        missing.join(", ")
    }

    /// Render the run as text
    pub fn report(&self) -> String {
        let mut out = String::new();
        let stamp = |t: DateTime<Utc>| t.format("%Y-%m-%d %H:%M:%S").to_string();

        let _ = writeln!(out, "\n================== FAILOVER AUDIT REPORT ==================");
        let _ = writeln!(
            out,
            "Status: {}",
            if self.is_success() { "SUCCESS" } else { "FAILED" }
        );
        let _ = writeln!(
            out,
            "Duration: {} to {}",
            stamp(self.started_at),
            self.finished_at.map(stamp).unwrap_or_else(|| "running".to_string())
        );

        for capture in &self.captures {
            let _ = writeln!(out, "\n=== Parent Connections ({}) ===", capture.phase);
            for parent in &capture.connections {
                let _ = writeln!(
                    out,
                    "  - {} on {} (tag: {})",
                    parent.id, parent.node, parent.tag
                );
                for session in &parent.sessions {
                    let _ = writeln!(
                        out,
                        "    - Session {} on {} (Thread: {})",
                        session.sequence, session.node, session.thread_label
                    );
                }
            }
        }

        for capture in &self.captures {
            let _ = writeln!(out, "\n=== Distribution ({}) ===", capture.phase);
            for (node, count) in capture.distribution() {
                let _ = writeln!(out, "  {}: {} connections", node, count);
            }
        }

        let _ = writeln!(out, "\n=== Failure Events ===");
        for event in &self.failure_events {
            let _ = writeln!(out, "  - {}", event);
        }

        let _ = writeln!(out, "\n=== Coherence Checks ===");
        for check in self.checks.values() {
            let _ = writeln!(
                out,
                "  - Connection {}: {} - {}",
                check.connection_id,
                if check.coherent { "COHERENT" } else { "NOT COHERENT" },
                check.details
            );
        }

        if !self.pairings.is_empty() {
            let _ = writeln!(out, "\n=== Failover Pairings ===");
            for pairing in &self.pairings {
                let _ = writeln!(
                    out,
                    "  - {}: {} -> {}: {}",
                    pairing.label, pairing.before, pairing.after, pairing.verdict
                );
            }
        }

        if !self.unverified.is_empty() {
            let _ = writeln!(out, "\n=== Unverified ===");
            for reason in &self.unverified {
                let _ = writeln!(out, "  - {}", reason);
            }
        }

        if let Some(analysis) = &self.rehydration {
            let _ = writeln!(out, "\n=== Rehydration Analysis ===");
            let _ = write!(out, "{}", analysis);
        }

        let coherent = self.checks.values().filter(|c| c.coherent).count();
        let _ = writeln!(
            out,
            "\nCoherence Summary: {}/{} connections maintained parent-child affinity",
            coherent,
            self.checks.len()
        );

        out
    }
}

fn coherence_check(verdict: &GroupingVerdict) -> CoherenceCheck {
    let (coherent, details) = if verdict.session_count == 0 {
        (true, format!("No sessions; parent on {}", verdict.parent_node))
    } else if verdict.shares_parent_node() {
        (true, format!("All sessions remained with parent on {}", verdict.parent_node))
    } else if verdict.is_success() {
        (
            false,
            format!(
                "Sessions moved off parent node {}: {}",
                verdict.parent_node,
                join_counts(&verdict.partitions)
            ),
        )
    } else {
        (
            false,
            format!(
                "Sessions split across different nodes! {}",
                join_counts(&verdict.partitions)
            ),
        )
    };

    CoherenceCheck {
        connection_id: verdict.connection_id,
        coherent,
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ConnectionRegistry, ConnectionStatus, StaticConnection, StaticSession};

    const BEFORE_TAG: &str = "MQCT1111111111111111QM1_100";
    const AFTER_TAG: &str = "MQCT2222222222222222QM2_200";

    async fn track(
        registry: &ConnectionRegistry,
        label: &str,
        tag: &str,
        nodes: &[&str],
    ) -> ConnectionId {
        let handle = StaticConnection::new("0000000000000000000000000000000000000000000000AA", tag, nodes[0]);
        let conn = registry.track_connection(&handle, label).await.unwrap();
        for (i, node) in nodes.iter().enumerate() {
            registry
                .track_session(&StaticSession::new(tag, *node), conn.id, i as u32 + 1)
                .await
                .unwrap();
        }
        conn.id
    }

    #[tokio::test]
    async fn test_clean_failover() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = CorrelationEngine::new(Arc::clone(&registry));
        let old = track(&registry, "APP-1", BEFORE_TAG, &["QM1", "QM1", "QM1"]).await;

        let mut audit = FailoverAudit::begin();
        let target = audit.capture(BEFORE_FAILOVER, &engine).await.busiest_node();
        assert_eq!(target.as_deref(), Some("QM1"));

        audit.record_failure_event("Node QM1 stopped");
        registry.update_status(old, ConnectionStatus::Reconnecting).await;
        let new = track(&registry, "APP-1", AFTER_TAG, &["QM2", "QM2", "QM2"]).await;

        audit.capture(AFTER_FAILOVER, &engine).await;
        assert_eq!(audit.verify_connections(&engine).await, 2);
        assert_eq!(audit.pair_failover(&engine, BEFORE_FAILOVER, AFTER_FAILOVER).await, 1);
        audit.finish();

        assert!(audit.is_success());
        assert_eq!(audit.pairings()[0].before, old);
        assert_eq!(audit.pairings()[0].after, new);
        assert!(audit.finished_at().is_some());

        let report = audit.report();
        assert!(report.contains("Status: SUCCESS"));
        assert!(report.contains("  - Node QM1 stopped"));
        assert!(report.contains("All sessions remained with parent on QM2"));
        assert!(report.contains("Coherence Summary: 2/2 connections maintained parent-child affinity"));
    }

    #[tokio::test]
    async fn test_split_after_failover_fails() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = CorrelationEngine::new(Arc::clone(&registry));
        track(&registry, "APP-1", BEFORE_TAG, &["QM1", "QM1", "QM1"]).await;

        let mut audit = FailoverAudit::begin();
        audit.capture(BEFORE_FAILOVER, &engine).await;
        track(&registry, "APP-1", AFTER_TAG, &["QM2", "QM2", "QM3"]).await;
        audit.capture(AFTER_FAILOVER, &engine).await;

        assert_eq!(audit.verify_connections(&engine).await, 1);
        // Counts still match, so the pairing alone passes
        assert_eq!(audit.pair_failover(&engine, BEFORE_FAILOVER, AFTER_FAILOVER).await, 1);
        audit.finish();

        assert!(!audit.is_success());
        let report = audit.report();
        assert!(report.contains("Status: FAILED"));
        assert!(report.contains("NOT COHERENT - Sessions split across different nodes!"));
        assert!(report.contains("Coherence Summary: 1/2"));
    }

    #[tokio::test]
    async fn test_lost_session_fails_pairing() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = CorrelationEngine::new(Arc::clone(&registry));
        track(&registry, "APP-1", BEFORE_TAG, &["QM1", "QM1", "QM1"]).await;

        let mut audit = FailoverAudit::begin();
        audit.capture(BEFORE_FAILOVER, &engine).await;
        track(&registry, "APP-1", AFTER_TAG, &["QM2", "QM2"]).await;
        audit.capture(AFTER_FAILOVER, &engine).await;

        audit.verify_connections(&engine).await;
        assert_eq!(audit.pair_failover(&engine, BEFORE_FAILOVER, AFTER_FAILOVER).await, 0);
        assert!(!audit.is_success());
    }

    #[tokio::test]
    async fn test_missing_phase_fails_the_run() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = CorrelationEngine::new(Arc::clone(&registry));
        track(&registry, "APP-1", BEFORE_TAG, &["QM1", "QM1", "QM1"]).await;
        let mut audit = FailoverAudit::begin();

        audit.capture(BEFORE_FAILOVER, &engine).await;
        assert_eq!(audit.pair_failover(&engine, BEFORE_FAILOVER, AFTER_FAILOVER).await, 0);
        audit.finish();

        assert!(audit.phase(AFTER_FAILOVER).is_none());
        assert_eq!(audit.unverified().len(), 1);
        assert!(!audit.is_success());

        let report = audit.report();
        assert!(report.contains("Status: FAILED"));
        assert!(report.contains("Failover pairing skipped: no capture for AFTER_FAILOVER"));
    }

    #[test]
    fn test_empty_run_is_not_success() {
        let mut audit = FailoverAudit::begin();
        audit.finish();
        assert!(!audit.is_success());
    }

    #[tokio::test]
    async fn test_label_without_live_parent_fails_the_run() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = CorrelationEngine::new(Arc::clone(&registry));
        let old = track(&registry, "APP-1", BEFORE_TAG, &["QM1", "QM1"]).await;

        let mut audit = FailoverAudit::begin();
        audit.capture(BEFORE_FAILOVER, &engine).await;
        registry.update_status(old, ConnectionStatus::Closed).await;
        audit.capture(AFTER_FAILOVER, &engine).await;

        assert_eq!(audit.verify_connections(&engine).await, 1);
        assert_eq!(audit.pair_failover(&engine, BEFORE_FAILOVER, AFTER_FAILOVER).await, 0);
        audit.finish();

        assert!(audit.pairings().is_empty());
        assert!(!audit.is_success());
        assert!(audit
            .report()
            .contains("APP-1 (CONN-1): no parent in AFTER_FAILOVER"));
    }

    #[tokio::test]
    async fn test_checks_follow_grouping_verdict() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = CorrelationEngine::new(Arc::clone(&registry));
        let moved = track(&registry, "APP-1", BEFORE_TAG, &["QM1"]).await;
        registry
            .track_session(&StaticSession::new(BEFORE_TAG, "QM2"), moved, 2)
            .await
            .unwrap();
        let empty = registry
            .track_connection(
                &StaticConnection::new("0000000000000000000000000000000000000000000000BB", AFTER_TAG, "QM2"),
                "APP-2",
            )
            .await
            .unwrap()
            .id;

        let mut audit = FailoverAudit::begin();
        assert_eq!(audit.verify_connections(&engine).await, 1);

        let checks: Vec<&CoherenceCheck> = audit.checks().collect();
        assert_eq!(checks[0].connection_id, moved);
        assert!(!checks[0].coherent);
        assert_eq!(checks[0].details, "Sessions split across different nodes! {QM1=1, QM2=1}");
        assert_eq!(checks[1].connection_id, empty);
        assert!(checks[1].coherent);
        assert_eq!(checks[1].details, "No sessions; parent on QM2");
    }

    #[tokio::test]
    async fn test_sessions_off_parent_node_are_not_coherent() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = CorrelationEngine::new(Arc::clone(&registry));
        let handle = StaticConnection::new("0000000000000000000000000000000000000000000000AA", BEFORE_TAG, "QM1");
        let parent = registry.track_connection(&handle, "APP-1").await.unwrap();
        for seq in 1..=2 {
            registry
                .track_session(&StaticSession::new(BEFORE_TAG, "QM3"), parent.id, seq)
                .await
                .unwrap();
        }

        let mut audit = FailoverAudit::begin();
        assert_eq!(audit.verify_connections(&engine).await, 0);
        let check = audit.checks().next().unwrap();
        assert!(check.details.contains("moved off parent node QM1: {QM3=2}"));
    }

    async fn move_label(
        registry: &ConnectionRegistry,
        from: ConnectionId,
        label: &str,
        node: &str,
    ) -> ConnectionId {
        registry.update_status(from, ConnectionStatus::Closed).await;
        let tag = format!("MQCT{:016X}{}_300", from.0 + 100, node);
        track(registry, label, &tag, &[node]).await
    }

    #[tokio::test]
    async fn test_rehydration_counts_parents_moving_back() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = CorrelationEngine::new(Arc::clone(&registry));
        let one = track(&registry, "APP-1", BEFORE_TAG, &["QM1"]).await;
        let two = track(&registry, "APP-2", "MQCT3333333333333333QM1_100", &["QM1"]).await;
        track(&registry, "APP-3", "MQCT4444444444444444QM2_100", &["QM2"]).await;

        let mut audit = FailoverAudit::begin();
        audit.capture(BEFORE_FAILOVER, &engine).await;

        let one = move_label(&registry, one, "APP-1", "QM2").await;
        move_label(&registry, two, "APP-2", "QM2").await;
        audit.capture(AFTER_FAILOVER, &engine).await;

        move_label(&registry, one, "APP-1", "QM1").await;
        audit.capture(AFTER_REHYDRATION, &engine).await;

        let analysis = audit
            .analyze_rehydration("QM1", BEFORE_FAILOVER, AFTER_FAILOVER, AFTER_REHYDRATION)
            .cloned()
            .unwrap();
        assert_eq!(analysis.tracked, 2);
        assert_eq!(analysis.moved_back, 1);
        assert_eq!(analysis.stayed_on_failover, 1);
        assert!(analysis.rebalanced());

        let before = audit.phase(BEFORE_FAILOVER).unwrap().distribution();
        assert_eq!(before.get("QM1"), Some(&2));
        assert_eq!(audit.phase(AFTER_FAILOVER).unwrap().distribution().get("QM2"), Some(&3));
        let last = audit.phase(AFTER_REHYDRATION).unwrap().distribution();
        assert_eq!(last.get("QM1"), Some(&1));
        assert_eq!(last.get("QM2"), Some(&2));

        let report = audit.report();
        assert!(report.contains("=== Distribution (AFTER_REHYDRATION) ==="));
        assert!(report.contains("  QM2: 3 connections"));
        assert!(report.contains("Connections moved back to QM1: 1"));
        assert!(report.contains("REBALANCED: some connections moved back to QM1"));
    }

    #[tokio::test]
    async fn test_rehydration_without_rebalancing() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = CorrelationEngine::new(Arc::clone(&registry));
        let one = track(&registry, "APP-1", BEFORE_TAG, &["QM1"]).await;

        let mut audit = FailoverAudit::begin();
        audit.capture(BEFORE_FAILOVER, &engine).await;
        move_label(&registry, one, "APP-1", "QM2").await;
        audit.capture(AFTER_FAILOVER, &engine).await;
        audit.capture(AFTER_REHYDRATION, &engine).await;

        let analysis = audit
            .analyze_rehydration("QM1", BEFORE_FAILOVER, AFTER_FAILOVER, AFTER_REHYDRATION)
            .unwrap();
        assert_eq!(analysis.moved_back, 0);
        assert_eq!(analysis.stayed_on_failover, 1);
        assert!(!analysis.rebalanced());
        assert!(analysis.to_string().contains("NO REBALANCING"));
    }

    #[tokio::test]
    async fn test_rehydration_needs_all_three_captures() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = CorrelationEngine::new(Arc::clone(&registry));
        let mut audit = FailoverAudit::begin();
        audit.capture(BEFORE_FAILOVER, &engine).await;

        assert!(audit
            .analyze_rehydration("QM1", BEFORE_FAILOVER, AFTER_FAILOVER, AFTER_REHYDRATION)
            .is_none());
        assert_eq!(
            audit.unverified(),
            ["Rehydration analysis skipped: no capture for AFTER_FAILOVER, AFTER_REHYDRATION"]
        );
        assert!(audit.rehydration().is_none());
    }

    #[tokio::test]
    async fn test_placements_skip_closed_parents() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = CorrelationEngine::new(Arc::clone(&registry));
        let one = track(&registry, "APP-1", BEFORE_TAG, &["QM1"]).await;
        move_label(&registry, one, "APP-1", "QM3").await;
        let two = track(&registry, "APP-2", AFTER_TAG, &["QM2"]).await;
        registry.update_status(two, ConnectionStatus::Failed).await;

        let mut audit = FailoverAudit::begin();
        let placements = audit.capture(BEFORE_FAILOVER, &engine).await.placements();
        assert_eq!(placements.len(), 1);
        assert_eq!(placements.get("APP-1").map(String::as_str), Some("QM3"));
    }

    #[tokio::test]
    async fn test_recapture_replaces_phase() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = CorrelationEngine::new(Arc::clone(&registry));
        let mut audit = FailoverAudit::begin();

        audit.capture(BEFORE_FAILOVER, &engine).await;
        track(&registry, "APP-1", BEFORE_TAG, &["QM1"]).await;
        audit.capture(BEFORE_FAILOVER, &engine).await;

        let capture = audit.phase(BEFORE_FAILOVER).unwrap();
        assert_eq!(capture.connections.len(), 1);
        assert_eq!(capture.correlation.pass, 2);
    }
}
