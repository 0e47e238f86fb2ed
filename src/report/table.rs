//! Connection and session table

use std::fmt::Write as _;

use crate::registry::ConnectionRecord;
use crate::stats::RegistryStats;

const RULE: &str = "|-----|---------|---------|----------------|\
--------------------------------------------------|\
----------------------------------------------------|\
----------------|--------------|---------------------------|";

/// Render every parent followed by its sessions, then counts per node
pub fn render_connection_table(records: &[ConnectionRecord]) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "\n================== CONNECTION AND SESSION TRACKING TABLE =================="
    );
    let _ = writeln!(
        out,
        "| {:<3} | {:<7} | {:<7} | {:<14} | {:<48} | {:<50} | {:<14} | {:<12} | {:<25} |",
        "#", "Type", "Conn", "Session", "CONNECTION_ID", "TAG", "Node", "Status", "Label"
    );
    let _ = writeln!(out, "{}", RULE);

    let mut row = 1;
    for parent in records {
        let _ = writeln!(
            out,
            "| {:<3} | {:<7} | {:<7} | {:<14} | {:<48} | {:<50} | {:<14} | {:<12} | {:<25} |",
            row,
            "Parent",
            parent.id.to_string(),
            "-",
            parent.identifier.as_str(),
            parent.tag,
            parent.node,
            parent.status.to_string(),
            parent.application_label
        );
        row += 1;

        for session in &parent.sessions {
            let _ = writeln!(
                out,
                "| {:<3} | {:<7} | {:<7} | {:<14} | {:<48} | {:<50} | {:<14} | {:<12} | {:<25} |",
                row,
                "Session",
                parent.id.to_string(),
                format!("S{} {}", session.sequence, session.id),
                parent.identifier.as_str(),
                session.tag,
                session.node,
                session.status.to_string(),
                parent.application_label
            );
            row += 1;
        }
    }

    let stats = RegistryStats::from_snapshot(records);
    let _ = writeln!(
        out,
        "\nSummary: {} Parent Connections, {} Total Sessions",
        stats.connections, stats.sessions
    );
    let _ = writeln!(
        out,
        "Distribution by node: {}",
        join_counts(&stats.parents_by_node)
    );

    out
}

/// `{a=1, b=2}`
pub(crate) fn join_counts(counts: &std::collections::BTreeMap<String, usize>) -> String {
    let body: Vec<String> = counts.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{{{}}}", body.join(", "))
}
