//! Per-quorum retry state machine.

use std::sync::Arc;
use std::time::Duration;

use avs_sync_core::{
    AttemptOutcome, AttemptResult, ChainClient, MetricsSink, OperatorSet, QuorumId,
    UpdateStakeStatus,
};
use tracing::{debug, error, info, trace, warn};

use crate::bounded::bounded;
use crate::config::{RetryPolicy, SyncConfig};
use crate::types::{QuorumOutcome, QuorumSyncState};

/// Replaces the entire operator set of one quorum, retrying until success
/// or until the retry limit is spent.
///
/// Every attempt re-reads membership before submitting. The contract
/// rejects any set that differs from the one valid at inclusion time, and
/// membership changing between read and inclusion is the usual reason an
/// update reverts.
pub struct QuorumReconciler {
    chain: Arc<dyn ChainClient>,
    metrics: Arc<dyn MetricsSink>,
    retry_limit: u32,
    retry_policy: RetryPolicy,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl QuorumReconciler {
    /// Create a reconciler for the given chain and metrics sink.
    pub fn new(
        chain: Arc<dyn ChainClient>,
        metrics: Arc<dyn MetricsSink>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            chain,
            metrics,
            retry_limit: config.retry_limit,
            retry_policy: config.retry_policy,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        }
    }

    /// Drive the state machine for `quorum` to a terminal state.
    pub async fn reconcile(&self, quorum: QuorumId) -> QuorumOutcome {
        let mut state = QuorumSyncState::Idle;
        loop {
            state = match self.step(quorum, state).await {
                QuorumSyncState::Succeeded {
                    attempts,
                    operators_updated,
                } => {
                    return QuorumOutcome::Succeeded {
                        quorum,
                        attempts,
                        operators_updated,
                    }
                }
                QuorumSyncState::GaveUp { attempts } => {
                    return QuorumOutcome::GaveUp { quorum, attempts }
                }
                next => {
                    trace!(quorum = %quorum, state = ?next, "Quorum sync transition");
                    next
                }
            };
        }
    }

    /// Advance the machine by one transition.
    pub async fn step(&self, quorum: QuorumId, state: QuorumSyncState) -> QuorumSyncState {
        match state {
            QuorumSyncState::Idle => {
                if self.retry_limit == 0 {
                    self.give_up(quorum, 0)
                } else {
                    QuorumSyncState::Fetching { attempt: 1 }
                }
            }
            QuorumSyncState::Fetching { attempt } => self.fetch(quorum, attempt).await,
            QuorumSyncState::Submitting { attempt, operators } => {
                self.submit(quorum, attempt, operators).await
            }
            QuorumSyncState::Retrying { attempt } => {
                if attempt >= self.retry_limit {
                    return self.give_up(quorum, attempt);
                }
                let next = attempt.saturating_add(1);
                let delay = self.retry_policy.delay_before(next);
                if !delay.is_zero() {
                    debug!(quorum = %quorum, delay_ms = delay.as_millis(), "Backing off before retry");
                    tokio::time::sleep(delay).await;
                }
                QuorumSyncState::Fetching { attempt: next }
            }
            terminal @ (QuorumSyncState::Succeeded { .. } | QuorumSyncState::GaveUp { .. }) => {
                terminal
            }
        }
    }

    async fn fetch(&self, quorum: QuorumId, attempt: u32) -> QuorumSyncState {
        debug!(
            quorum = %quorum,
            retry_limit = self.retry_limit,
            attempt,
            "Fetching operator set for quorum"
        );

        let read = bounded(
            self.read_timeout,
            "read operators in quorum",
            self.chain.operators_in_quorum(quorum),
        )
        .await;

        match read {
            Ok(addresses) => QuorumSyncState::Submitting {
                attempt,
                operators: OperatorSet::from_fetched(addresses),
            },
            Err(e) => {
                warn!(
                    error = %e,
                    quorum = %quorum,
                    retry_limit = self.retry_limit,
                    attempt,
                    "Error fetching operator addresses in quorum"
                );
                self.record(quorum, attempt, AttemptResult::TransientError);
                QuorumSyncState::Retrying { attempt }
            }
        }
    }

    async fn submit(
        &self,
        quorum: QuorumId,
        attempt: u32,
        operators: OperatorSet,
    ) -> QuorumSyncState {
        info!(
            quorum = %quorum,
            operators = ?operators.as_slice(),
            "Updating stakes of operators in quorum"
        );

        let write = bounded(
            self.write_timeout,
            "update stakes of entire operator set",
            self.chain.update_stakes_for_quorum(&operators, quorum),
        )
        .await;

        match write {
            Ok(receipt) if receipt.is_successful() => {
                self.record(quorum, attempt, AttemptResult::Success);
                self.metrics
                    .increment_update_attempt(UpdateStakeStatus::Succeed, quorum);
                self.metrics.set_operators_updated(quorum, operators.len());
                info!(
                    quorum = %quorum,
                    attempt,
                    tx_hash = %receipt.tx_hash,
                    operators_updated = operators.len(),
                    "Updated stakes of entire operator set for quorum"
                );
                QuorumSyncState::Succeeded {
                    attempts: attempt,
                    operators_updated: operators.len(),
                }
            }
            Ok(receipt) => {
                self.metrics.increment_tx_reverted();
                self.record(quorum, attempt, AttemptResult::Reverted);
                error!(
                    quorum = %quorum,
                    retry_limit = self.retry_limit,
                    attempt,
                    tx_hash = %receipt.tx_hash,
                    "Update stakes of entire operator set for quorum reverted"
                );
                QuorumSyncState::Retrying { attempt }
            }
            Err(e) => {
                self.record(quorum, attempt, AttemptResult::TransientError);
                warn!(
                    error = %e,
                    quorum = %quorum,
                    retry_limit = self.retry_limit,
                    attempt,
                    "Error updating stakes of entire operator set for quorum"
                );
                QuorumSyncState::Retrying { attempt }
            }
        }
    }

    fn give_up(&self, quorum: QuorumId, attempts: u32) -> QuorumSyncState {
        self.metrics
            .increment_update_attempt(UpdateStakeStatus::Error, quorum);
        error!(
            quorum = %quorum,
            retry_limit = self.retry_limit,
            attempts,
            "Giving up after retrying"
        );
        QuorumSyncState::GaveUp { attempts }
    }

    fn record(&self, quorum: QuorumId, attempt: u32, result: AttemptResult) {
        self.metrics
            .record_attempt(&AttemptOutcome::new(quorum, attempt, result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avs_sync_core::{Address, ChainCall, InMemoryChainClient, InMemoryMetrics, WriteFault};

    fn addr(v: u64) -> Address {
        Address::from_low_u64(v)
    }

    fn setup(retry_limit: u32) -> (QuorumReconciler, Arc<InMemoryChainClient>, Arc<InMemoryMetrics>) {
        let chain = Arc::new(InMemoryChainClient::new());
        let metrics = Arc::new(InMemoryMetrics::new());
        let config = SyncConfig::for_quorums([QuorumId::new(0)]).retry_limit(retry_limit);
        let reconciler = QuorumReconciler::new(chain.clone(), metrics.clone(), &config);
        (reconciler, chain, metrics)
    }

    #[tokio::test]
    async fn test_idle_moves_to_fetching_first_attempt() {
        let (reconciler, _, _) = setup(3);
        let next = reconciler.step(QuorumId::new(0), QuorumSyncState::Idle).await;
        assert_eq!(next, QuorumSyncState::Fetching { attempt: 1 });
    }

    #[tokio::test]
    async fn test_fetch_sorts_and_dedups_into_submitting() {
        let (reconciler, chain, _) = setup(3);
        let quorum = QuorumId::new(0);
        chain
            .set_membership(quorum, vec![addr(5), addr(1), addr(5), addr(3)])
            .await;

        let next = reconciler
            .step(quorum, QuorumSyncState::Fetching { attempt: 1 })
            .await;

        assert_eq!(
            next,
            QuorumSyncState::Submitting {
                attempt: 1,
                operators: OperatorSet::from_fetched(vec![addr(1), addr(3), addr(5)]),
            }
        );
    }

    #[tokio::test]
    async fn test_revert_moves_to_retrying() {
        let (reconciler, chain, metrics) = setup(3);
        let quorum = QuorumId::new(0);
        chain.fault_writes(quorum, WriteFault::Revert, 1).await;

        let next = reconciler
            .step(
                quorum,
                QuorumSyncState::Submitting {
                    attempt: 1,
                    operators: OperatorSet::from_fetched(vec![addr(1)]),
                },
            )
            .await;

        assert_eq!(next, QuorumSyncState::Retrying { attempt: 1 });
        assert_eq!(metrics.tx_reverted(), 1);
        assert_eq!(
            metrics.attempts(),
            vec![AttemptOutcome::new(quorum, 1, AttemptResult::Reverted)]
        );
    }

    #[tokio::test]
    async fn test_retrying_refetches_with_next_attempt() {
        let (reconciler, _, _) = setup(3);
        let next = reconciler
            .step(QuorumId::new(0), QuorumSyncState::Retrying { attempt: 1 })
            .await;
        assert_eq!(next, QuorumSyncState::Fetching { attempt: 2 });
    }

    #[tokio::test]
    async fn test_retrying_at_limit_gives_up() {
        let (reconciler, _, metrics) = setup(2);
        let quorum = QuorumId::new(0);
        let next = reconciler
            .step(quorum, QuorumSyncState::Retrying { attempt: 2 })
            .await;

        assert_eq!(next, QuorumSyncState::GaveUp { attempts: 2 });
        assert_eq!(metrics.update_attempts(UpdateStakeStatus::Error, quorum), 1);
    }

    #[tokio::test]
    async fn test_zero_retry_limit_gives_up_without_chain_calls() {
        let (reconciler, chain, metrics) = setup(0);
        let quorum = QuorumId::new(0);

        let outcome = reconciler.reconcile(quorum).await;

        assert_eq!(outcome, QuorumOutcome::GaveUp { quorum, attempts: 0 });
        assert!(chain.calls().await.is_empty());
        assert_eq!(metrics.update_attempts(UpdateStakeStatus::Error, quorum), 1);
    }

    #[tokio::test]
    async fn test_read_failure_consumes_an_attempt() {
        let (reconciler, chain, metrics) = setup(3);
        let quorum = QuorumId::new(0);
        chain.set_membership(quorum, vec![addr(2), addr(1)]).await;
        chain.fail_reads(quorum, 1).await;

        let outcome = reconciler.reconcile(quorum).await;

        assert_eq!(
            outcome,
            QuorumOutcome::Succeeded {
                quorum,
                attempts: 2,
                operators_updated: 2
            }
        );
        assert_eq!(
            chain.calls().await,
            vec![
                ChainCall::OperatorsInQuorum(quorum),
                ChainCall::OperatorsInQuorum(quorum),
                ChainCall::UpdateStakesForQuorum {
                    quorum,
                    operators: vec![addr(1), addr(2)]
                },
            ]
        );
        assert_eq!(
            metrics.attempts(),
            vec![
                AttemptOutcome::new(quorum, 1, AttemptResult::TransientError),
                AttemptOutcome::new(quorum, 2, AttemptResult::Success),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_timeout_is_a_transient_failure() {
        let chain = Arc::new(InMemoryChainClient::new());
        let metrics = Arc::new(InMemoryMetrics::new());
        let quorum = QuorumId::new(0);
        chain.set_membership(quorum, vec![addr(1)]).await;
        chain.set_write_delay(Duration::from_secs(120)).await;

        let config = SyncConfig::for_quorums([quorum])
            .retry_limit(2)
            .write_timeout(Duration::from_secs(90));
        let reconciler = QuorumReconciler::new(chain.clone(), metrics.clone(), &config);

        let outcome = reconciler.reconcile(quorum).await;

        assert_eq!(outcome, QuorumOutcome::GaveUp { quorum, attempts: 2 });
        assert_eq!(chain.write_count().await, 2);
        assert_eq!(metrics.tx_reverted(), 0);
        assert_eq!(metrics.update_attempts(UpdateStakeStatus::Error, quorum), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_backoff_waits_between_attempts() {
        let chain = Arc::new(InMemoryChainClient::new());
        let metrics = Arc::new(InMemoryMetrics::new());
        let quorum = QuorumId::new(0);
        chain.fault_writes(quorum, WriteFault::Error, 2).await;

        let config = SyncConfig::for_quorums([quorum])
            .retry_limit(3)
            .retry_policy(RetryPolicy::fixed(Duration::from_secs(10)));
        let reconciler = QuorumReconciler::new(chain, metrics, &config);

        let started = tokio::time::Instant::now();
        let outcome = reconciler.reconcile(quorum).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts(), 3);
        assert!(started.elapsed() >= Duration::from_secs(20));
    }
}
