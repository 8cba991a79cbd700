//! Core types for the reconciler.

use avs_sync_core::{OperatorSet, QuorumId};
use serde::{Deserialize, Serialize};

/// Which reconciliation path a cycle takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Replace the entire operator set of every resolved quorum.
    FullSet,
    /// Update a configured operator subset across all quorums at once.
    Subset,
}

/// State of the per-quorum retry state machine.
///
/// `Idle → Fetching → Submitting → {Succeeded | Retrying → Fetching | GaveUp}`.
/// The operator set only exists inside `Submitting`, so a failed attempt
/// can never carry a stale set into the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuorumSyncState {
    /// Nothing attempted yet.
    Idle,
    /// Reading the current membership.
    Fetching { attempt: u32 },
    /// Submitting the set read during this attempt.
    Submitting { attempt: u32, operators: OperatorSet },
    /// The given attempt failed.
    Retrying { attempt: u32 },
    /// Stakes updated.
    Succeeded { attempts: u32, operators_updated: usize },
    /// Attempts exhausted.
    GaveUp { attempts: u32 },
}

impl QuorumSyncState {
    /// Whether the machine has stopped.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::GaveUp { .. })
    }
}

/// Terminal result of reconciling one quorum in a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QuorumOutcome {
    Succeeded {
        quorum: QuorumId,
        attempts: u32,
        operators_updated: usize,
    },
    GaveUp {
        quorum: QuorumId,
        attempts: u32,
    },
}

impl QuorumOutcome {
    #[must_use]
    pub const fn quorum(&self) -> QuorumId {
        match self {
            Self::Succeeded { quorum, .. } | Self::GaveUp { quorum, .. } => *quorum,
        }
    }

    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::GaveUp { attempts, .. } => *attempts,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Result of the single subset transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubsetOutcome {
    Succeeded { tx_hash: String },
    Reverted { tx_hash: String },
    Failed { reason: String },
}

impl SubsetOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// What one sync cycle did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CycleReport {
    FullSet {
        /// Quorums resolved for this cycle, in processing order.
        quorums: Vec<QuorumId>,
        outcomes: Vec<QuorumOutcome>,
    },
    Subset {
        operators: usize,
        /// Quorums the outcome was attributed to.
        quorums: Vec<QuorumId>,
        outcome: SubsetOutcome,
    },
}

impl CycleReport {
    /// Which path produced this report.
    #[must_use]
    pub const fn mode(&self) -> SyncMode {
        match self {
            Self::FullSet { .. } => SyncMode::FullSet,
            Self::Subset { .. } => SyncMode::Subset,
        }
    }

    /// Whether every update in the cycle succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        match self {
            Self::FullSet { outcomes, .. } => outcomes.iter().all(QuorumOutcome::is_success),
            Self::Subset { outcome, .. } => outcome.is_success(),
        }
    }

    /// Quorums whose update succeeded (full-set only).
    #[must_use]
    pub fn succeeded_quorums(&self) -> Vec<QuorumId> {
        self.quorums_where(true)
    }

    /// Quorums that exhausted their retries (full-set only).
    #[must_use]
    pub fn gave_up_quorums(&self) -> Vec<QuorumId> {
        self.quorums_where(false)
    }

    fn quorums_where(&self, success: bool) -> Vec<QuorumId> {
        match self {
            Self::FullSet { outcomes, .. } => outcomes
                .iter()
                .filter(|o| o.is_success() == success)
                .map(QuorumOutcome::quorum)
                .collect(),
            Self::Subset { .. } => Vec::new(),
        }
    }
}
