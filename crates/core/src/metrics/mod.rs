//! Metrics sink for reconciliation outcomes.
//!
//! Sinks are injected instances rather than process-wide globals, so several
//! reconcilers can run side by side without sharing counters. Every
//! implementation must tolerate concurrent calls.
//!
//! Backends:
//! - [`PrometheusMetrics`]: native Prometheus counters on an owned registry.
//! - [`InMemoryMetrics`]: tallies for assertions in tests.
//! - [`NoopMetrics`]: discards everything.

mod memory;
mod prometheus;

use std::fmt;

use crate::types::{AttemptOutcome, QuorumId};

pub use self::memory::InMemoryMetrics;
pub use self::prometheus::PrometheusMetrics;

/// Status label of a per-quorum update attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateStakeStatus {
    /// The quorum (or subset) update failed: submission error, revert, or
    /// retries exhausted.
    Error,
    /// The update was mined successfully.
    Succeed,
}

impl UpdateStakeStatus {
    /// Label value used by metrics backends.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Succeed => "succeed",
        }
    }
}

impl fmt::Display for UpdateStakeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives reconciliation outcomes.
#[allow(unused_variables)]
pub trait MetricsSink: Send + Sync + 'static {
    /// Count a terminal update outcome for `quorum`.
    fn increment_update_attempt(&self, status: UpdateStakeStatus, quorum: QuorumId);

    /// Count a transaction that was mined but reverted.
    fn increment_tx_reverted(&self);

    /// Record how many operators the last successful update of `quorum` covered.
    fn set_operators_updated(&self, quorum: QuorumId, count: usize);

    /// Record a single fetch/submit attempt.
    fn record_attempt(&self, outcome: &AttemptOutcome) {}
}

/// Sink that drops every observation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn increment_update_attempt(&self, _status: UpdateStakeStatus, _quorum: QuorumId) {}

    fn increment_tx_reverted(&self) {}

    fn set_operators_updated(&self, _quorum: QuorumId, _count: usize) {}
}
