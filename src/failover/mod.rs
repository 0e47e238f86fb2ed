//! Failover certification
//!
//! [`FailoverAudit`] records a failover run: a capture before the node goes
//! down, the failure events injected, a capture after clients reconnect, and
//! the checks run against both. A third capture once the node is back shows
//! whether parents returned to it.
//!
//! # Example
//!
//! ```ignore
//! let mut audit = FailoverAudit::begin();
//! let target = audit.capture(BEFORE_FAILOVER, &engine).await.busiest_node();
//! let target = target.unwrap_or_default();
//! audit.record_failure_event(format!("Node {} stopped", target));
//! // ... wait for reconnection ...
//! audit.capture(AFTER_FAILOVER, &engine).await;
//! audit.verify_connections(&engine).await;
//! audit.pair_failover(&engine, BEFORE_FAILOVER, AFTER_FAILOVER).await;
//! // ... bring the node back ...
//! audit.capture(AFTER_REHYDRATION, &engine).await;
//! audit.analyze_rehydration(&target, BEFORE_FAILOVER, AFTER_FAILOVER, AFTER_REHYDRATION);
//! audit.finish();
//! println!("{}", audit.report());
//! ```

pub mod audit;

pub use audit::{
    CoherenceCheck, FailoverAudit, FailoverPairing, PhaseCapture, RehydrationAnalysis,
    AFTER_FAILOVER, AFTER_REHYDRATION, BEFORE_FAILOVER,
};
