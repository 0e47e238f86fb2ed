//! Simulated failover drill
//!
//! Run with: cargo run --example failover_drill [PARENTS] [SESSIONS] [--split] [--rehydrate] [--watch]
//!
//! Examples:
//!   cargo run --example failover_drill                 # 2 parents, 3 sessions each
//!   cargo run --example failover_drill 4 5             # 4 parents, 5 sessions each
//!   cargo run --example failover_drill 2 3 --split     # one session lands on the wrong node
//!   cargo run --example failover_drill 4 3 --rehydrate # bring QM1 back, half the parents return
//!   cargo run --example failover_drill 2 3 --watch     # keep correlating until Ctrl+C
//!
//! Parents start on QM1. The drill captures the state, "stops" the busiest
//! node, reconnects every parent and its sessions on QM2, captures again and
//! prints the audit report. With `--rehydrate` the stopped node comes back and
//! the first half of the parents reconnect to it before a third capture.

use std::time::Duration;

use conntag_rs::failover::{FailoverAudit, AFTER_FAILOVER, AFTER_REHYDRATION, BEFORE_FAILOVER};
use conntag_rs::{
    AffinityMonitor, ConnectionId, ConnectionRegistry, ConnectionStatus, MonitorConfig,
    StaticConnection, StaticSession,
};

/// Identifier issued by `node`: the AMQC eyecatcher, the padded node name and
/// a per-connection suffix
fn identifier(node: &str, n: usize) -> String {
    let name = hex::encode_upper(format!("AMQC{:<12}", node));
    format!("{}{:016X}", name, 0xA1B2_C3D4_0000_0000u64 + n as u64)
}

fn tag(handle: u64, node: &str, stamp: u64) -> String {
    format!("MQCT{:016X}{}_{}", handle, node, stamp)
}

async fn open_parent(
    registry: &ConnectionRegistry,
    label: &str,
    node: &str,
    n: usize,
    sessions: u32,
    stray_node: Option<&str>,
) -> Option<ConnectionId> {
    let stamp = chrono::Utc::now().timestamp() as u64;
    let tag = tag(0x8A11_0000_0000 + n as u64 + stamp, node, stamp);
    let handle = StaticConnection::new(identifier(node, n), tag.clone(), node).endpoint("10.10.10.10", 1414);

    let parent = registry.track_connection(&handle, label).await?;
    if let Some(name) = parent.identifier.embedded_name() {
        println!("{} -> {} (identifier names {})", label, parent.id, name);
    }

    for seq in 1..=sessions {
        let session_node = match stray_node {
            Some(stray) if seq == sessions => stray,
            _ => node,
        };
        let session = StaticSession::new(tag.clone(), session_node).on_thread(format!("{}-worker-{}", label, seq));
        registry.track_session(&session, parent.id, seq).await;
    }

    Some(parent.id)
}

fn print_usage() {
    eprintln!("Usage: failover_drill [PARENTS] [SESSIONS] [--split] [--rehydrate] [--watch]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  PARENTS     Parent connections to open (default: 2)");
    eprintln!("  SESSIONS    Sessions per parent (default: 3)");
    eprintln!("  --split     Put the last session of each reconnected parent on QM3");
    eprintln!("  --rehydrate Restart the stopped node and move half the parents back");
    eprintln!("  --watch     Keep running scheduled correlation passes until Ctrl+C");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let numbers: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();
    let parents: usize = match numbers.first() {
        Some(n) => n.parse()?,
        None => 2,
    };
    let sessions: u32 = match numbers.get(1) {
        Some(n) => n.parse()?,
        None => 3,
    };
    let split = args.iter().any(|a| a == "--split");
    let rehydrate = args.iter().any(|a| a == "--rehydrate");
    let watch = args.iter().any(|a| a == "--watch");

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("conntag_rs=info".parse()?)
                .add_directive("failover_drill=debug".parse()?),
        )
        .init();

    let config = MonitorConfig::new()
        .correlation_interval(Duration::from_secs(2))
        .report_on_shutdown(true);
    let monitor = AffinityMonitor::new(config);
    let registry = monitor.registry();
    let engine = monitor.engine();

    let mut originals = Vec::new();
    for n in 0..parents {
        let label = format!("DRILL-{}", n + 1);
        if let Some(id) = open_parent(registry, &label, "QM1", n, sessions, None).await {
            originals.push(id);
        }
    }

    let mut audit = FailoverAudit::begin();
    let target = audit.capture(BEFORE_FAILOVER, engine).await.busiest_node();
    let target = target.unwrap_or_else(|| "QM1".to_string());

    audit.record_failure_event(format!("Node {} stopped", target));
    for id in &originals {
        registry.update_status(*id, ConnectionStatus::Reconnecting).await;
    }

    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut replacements = Vec::new();
    for n in 0..parents {
        let label = format!("DRILL-{}", n + 1);
        let stray = if split { Some("QM3") } else { None };
        if let Some(id) = open_parent(registry, &label, "QM2", parents + n, sessions, stray).await {
            replacements.push((label, id));
        }
    }
    for id in &originals {
        registry.update_status(*id, ConnectionStatus::Closed).await;
    }

    audit.capture(AFTER_FAILOVER, engine).await;
    audit.verify_connections(engine).await;
    audit.pair_failover(engine, BEFORE_FAILOVER, AFTER_FAILOVER).await;

    if rehydrate {
        audit.record_failure_event(format!("Node {} restarted", target));
        let returning = replacements.len() / 2;
        for (n, (label, id)) in replacements.iter().take(returning).enumerate() {
            registry.update_status(*id, ConnectionStatus::Closed).await;
            open_parent(registry, label, &target, 2 * parents + n, sessions, None).await;
        }

        audit.capture(AFTER_REHYDRATION, engine).await;
        audit.analyze_rehydration(&target, BEFORE_FAILOVER, AFTER_FAILOVER, AFTER_REHYDRATION);
    }
    audit.finish();

    println!("{}", monitor.connection_report().await);
    println!("{}", monitor.latest_correlation_report().await);
    println!("{}", audit.report());

    if watch {
        println!("Watching; press Ctrl+C to stop");
        monitor
            .run_until(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await;
    }

    if audit.is_success() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
