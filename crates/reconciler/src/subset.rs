//! Single-transaction update of an operator subset.

use std::sync::Arc;
use std::time::Duration;

use avs_sync_core::{ChainClient, MetricsSink, OperatorSet, QuorumId, UpdateStakeStatus};
use tracing::{error, info};

use crate::bounded::bounded;
use crate::config::SyncConfig;
use crate::types::SubsetOutcome;

/// Updates a configured operator subset across every quorum in one
/// transaction. No retries: the next scheduled cycle starts over.
pub struct SubsetReconciler {
    chain: Arc<dyn ChainClient>,
    metrics: Arc<dyn MetricsSink>,
    write_timeout: Duration,
}

impl SubsetReconciler {
    /// Create a subset reconciler bounded by the configured write timeout.
    pub fn new(
        chain: Arc<dyn ChainClient>,
        metrics: Arc<dyn MetricsSink>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            chain,
            metrics,
            write_timeout: config.write_timeout,
        }
    }

    /// Submit the subset update. `quorums` only labels the reported metrics;
    /// the transaction covers every quorum the operators belong to.
    pub async fn update_subset(
        &self,
        operators: &OperatorSet,
        quorums: &[QuorumId],
    ) -> SubsetOutcome {
        info!(operators = ?operators.as_slice(), "Updating stakes of operator subset");

        let write = bounded(
            self.write_timeout,
            "update stakes of operator subset",
            self.chain
                .update_stakes_for_operator_subset(operators.as_slice()),
        )
        .await;

        match write {
            Ok(receipt) if receipt.is_successful() => {
                self.attribute(UpdateStakeStatus::Succeed, quorums);
                info!(tx_hash = %receipt.tx_hash, "Completed stake update successfully");
                SubsetOutcome::Succeeded {
                    tx_hash: receipt.tx_hash,
                }
            }
            Ok(receipt) => {
                self.metrics.increment_tx_reverted();
                self.attribute(UpdateStakeStatus::Error, quorums);
                error!(
                    tx_hash = %receipt.tx_hash,
                    "Update stakes of operator subset for all quorums reverted"
                );
                SubsetOutcome::Reverted {
                    tx_hash: receipt.tx_hash,
                }
            }
            Err(e) => {
                self.attribute(UpdateStakeStatus::Error, quorums);
                error!(error = %e, "Error updating stakes of operator subset for all quorums");
                SubsetOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn attribute(&self, status: UpdateStakeStatus, quorums: &[QuorumId]) {
        for quorum in quorums {
            self.metrics.increment_update_attempt(status, *quorum);
        }
    }
}
