//! Correlation report

use std::fmt::Write as _;

use super::table::join_counts;
use crate::correlation::CorrelationSnapshot;
use crate::stats::CorrelationStats;

/// Render every group summary, warnings for incoherent groups and totals
pub fn render_correlation_report(snapshot: &CorrelationSnapshot) -> String {
    let stats = CorrelationStats::from_snapshot(snapshot);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "\n================== CORRELATION REPORT =================="
    );
    let _ = writeln!(
        out,
        "Pass: {}  Completed: {}  Duration: {:?}",
        snapshot.pass,
        snapshot.completed_at.format("%Y-%m-%d %H:%M:%S%.3f UTC"),
        snapshot.duration
    );
    let _ = writeln!(out, "Total Groups: {}", stats.groups);

    for group in snapshot.groups.values() {
        let _ = writeln!(out, "\n{}", group.summary());

        if !group.is_coherent() {
            let _ = writeln!(out, "WARNING: Incoherent group detected!");
            let _ = writeln!(out, "Parent node: {}", group.node);
            let parents = group.parent_breakdown();
            if parents.len() > 1 {
                for (node, count) in parents {
                    let _ = writeln!(out, "  Parents on {}: {}", node, count);
                }
            }
            for (node, count) in group.node_breakdown() {
                let _ = writeln!(out, "  Sessions on {}: {}", node, count);
            }
        }
    }

    let _ = writeln!(out, "\n=== Summary ===");
    let _ = writeln!(
        out,
        "Coherent Groups: {}/{} ({}%)",
        stats.coherent_groups,
        stats.groups,
        stats.coherence_percent()
    );
    let _ = writeln!(out, "Total Sessions: {}", stats.sessions);
    let _ = writeln!(out, "Distribution by node:");
    for (node, count) in &stats.groups_by_node {
        let _ = writeln!(out, "  {}: {} groups", node, count);
    }

    if !snapshot.tag_nodes.is_empty() {
        let _ = writeln!(out, "Session tags seen: {}", tags_per_node(snapshot));
    }

    out
}

fn tags_per_node(snapshot: &CorrelationSnapshot) -> String {
    let mut per_node = std::collections::BTreeMap::new();
    for node in snapshot.tag_nodes.values() {
        *per_node.entry(node.clone()).or_insert(0) += 1;
    }
    join_counts(&per_node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::group::tests::{connection, session};
    use crate::correlation::Group;
    use crate::tag::GroupKey;

    const TAG_A: &str = "MQCTAAAAAAAAAAAAAAAANODE1_1";
    const TAG_B: &str = "MQCTBBBBBBBBBBBBBBBBNODE2_2";

    fn snapshot() -> CorrelationSnapshot {
        let mut snapshot = CorrelationSnapshot::empty();
        snapshot.pass = 4;

        let mut a = Group::new(GroupKey::new("AAAAAAAAAAAAAAAA"), &connection(1, TAG_A, "NODE1"));
        a.add_session(session(1, 1, 1, TAG_A, "NODE1"));
        a.add_session(session(2, 1, 2, TAG_A, "NODE1"));

        let mut b = Group::new(GroupKey::new("BBBBBBBBBBBBBBBB"), &connection(2, TAG_B, "NODE2"));
        b.add_session(session(3, 2, 1, TAG_B, "NODE2"));
        b.add_session(session(4, 2, 2, TAG_B, "NODE3"));

        let mut c = Group::new(GroupKey::new("CCCCCCCCCCCCCCCC"), &connection(3, TAG_B, "NODE2"));
        c.refresh();

        let mut d = Group::new(GroupKey::new("DDDDDDDDDDDDDDDD"), &connection(5, TAG_A, "NODE1"));
        d.admit(&connection(6, TAG_A, "NODE2"));

        snapshot.groups.insert(a.id.clone(), a);
        snapshot.groups.insert(b.id.clone(), b);
        snapshot.groups.insert(c.id.clone(), c);
        snapshot.groups.insert(d.id.clone(), d);
        snapshot.tag_nodes.insert(TAG_A.to_string(), "NODE1".to_string());
        snapshot
    }

    #[test]
    fn test_report_sections() {
        let report = render_correlation_report(&snapshot());

        assert!(report.contains("Pass: 4"));
        assert!(report.contains("Total Groups: 4"));
        assert!(report.contains("Group AAAAAAAAAAAAAAAA: Node=NODE1, Parent=CONN-1, Sessions=2, Coherent=true"));
        assert!(report.contains("WARNING: Incoherent group detected!"));
        assert!(report.contains("  Sessions on NODE3: 1"));
        assert!(report.contains("Coherent Groups: 2/4 (50%)"));
        assert!(report.contains("  NODE2: 2 groups"));
        assert!(report.contains("Coherent=false, Parents=2"));
        assert!(report.contains("  Parents on NODE2: 1"));
        assert!(report.contains("Session tags seen: {NODE1=1}"));
    }

    #[test]
    fn test_empty_report() {
        let report = render_correlation_report(&CorrelationSnapshot::empty());
        assert!(report.contains("Coherent Groups: 0/0 (0%)"));
        assert!(!report.contains("WARNING"));
    }
}
