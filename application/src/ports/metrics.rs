//! Metrics sink port
//!
//! Per-run attempt counts observed by a worker instance are non-durable
//! bookkeeping: they vanish on restart and must never act as the retry
//! ceiling (the broker's redelivery policy owns that). Routing them
//! through this port keeps them observable without becoming program logic.

use conclave_domain::{Decision, RunId};

/// Observability callbacks from the pipeline worker
pub trait MetricsSink: Send + Sync {
    /// A delivery for this run started processing (attempt is the durable
    /// counter's new value)
    fn on_attempt(&self, _run_id: &RunId, _attempt: u32) {}

    /// A run finished with a decision
    fn on_completed(&self, _run_id: &RunId, _decision: Decision) {}

    /// A run failed and the message was negatively acknowledged
    fn on_failed(&self, _run_id: &RunId, _error: &str) {}

    /// A malformed message was dropped without processing
    fn on_dropped(&self, _reason: &str) {}
}

/// No-op sink for when metrics are not wired up
pub struct NoMetrics;

impl MetricsSink for NoMetrics {}
