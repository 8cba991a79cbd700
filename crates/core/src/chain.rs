//! Chain access capability and an in-memory implementation.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{Address, OperatorSet, QuorumId, Receipt};

/// Read/write access to the stake registry contract.
///
/// Implementations own signing, gas and encoding. Callers bound every call
/// with their own timeout.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Number of quorums registered in the contract.
    async fn quorum_count(&self) -> Result<u8>;

    /// Operators registered in `quorum` at the latest block.
    async fn operators_in_quorum(&self, quorum: QuorumId) -> Result<Vec<Address>>;

    /// Replace the stakes of the entire operator set of `quorum`.
    ///
    /// The contract reverts unless `operators` is exactly the membership
    /// valid at inclusion time.
    async fn update_stakes_for_quorum(
        &self,
        operators: &OperatorSet,
        quorum: QuorumId,
    ) -> Result<Receipt>;

    /// Update the stakes of `operators` across every quorum in one transaction.
    async fn update_stakes_for_operator_subset(&self, operators: &[Address]) -> Result<Receipt>;
}

/// A call observed by [`InMemoryChainClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainCall {
    QuorumCount,
    OperatorsInQuorum(QuorumId),
    UpdateStakesForQuorum {
        quorum: QuorumId,
        operators: Vec<Address>,
    },
    UpdateStakesForOperatorSubset {
        operators: Vec<Address>,
    },
}

impl ChainCall {
    /// Whether this call submits a transaction.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(
            self,
            Self::UpdateStakesForQuorum { .. } | Self::UpdateStakesForOperatorSubset { .. }
        )
    }
}

/// Scripted failure for the next write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFault {
    /// The submission fails before inclusion.
    Error,
    /// The transaction is mined but reverts.
    Revert,
}

#[derive(Debug, Default)]
struct ChainState {
    quorum_count: Option<u8>,
    quorum_count_failures: usize,
    membership: BTreeMap<QuorumId, Vec<Address>>,
    queued_membership: HashMap<QuorumId, VecDeque<Vec<Address>>>,
    read_failures: HashMap<QuorumId, usize>,
    write_faults: HashMap<QuorumId, VecDeque<WriteFault>>,
    subset_faults: VecDeque<WriteFault>,
    write_delay: Option<Duration>,
    calls: Vec<ChainCall>,
    tx_counter: u64,
}

impl ChainState {
    fn next_tx_hash(&mut self) -> String {
        self.tx_counter = self.tx_counter.saturating_add(1);
        format!("0x{:064x}", self.tx_counter)
    }

    fn settle(&mut self, fault: Option<WriteFault>) -> Result<Receipt> {
        match fault {
            Some(WriteFault::Error) => Err(Error::write_failed("scripted submission failure")),
            Some(WriteFault::Revert) => Ok(Receipt::reverted(self.next_tx_hash())),
            None => Ok(Receipt::successful(self.next_tx_hash())),
        }
    }
}

/// In-memory registry with scriptable faults and a call log.
///
/// Quorum count defaults to the number of quorums with membership unless set
/// explicitly.
#[derive(Debug, Default)]
pub struct InMemoryChainClient {
    state: Mutex<ChainState>,
}

impl InMemoryChainClient {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stable membership of a quorum.
    pub async fn set_membership(&self, quorum: QuorumId, operators: Vec<Address>) {
        self.state.lock().await.membership.insert(quorum, operators);
    }

    /// Serve `operators` for the next read of `quorum` only, ahead of the
    /// stable membership. Queued sets are served in order.
    pub async fn queue_membership(&self, quorum: QuorumId, operators: Vec<Address>) {
        self.state
            .lock()
            .await
            .queued_membership
            .entry(quorum)
            .or_default()
            .push_back(operators);
    }

    /// Override the reported quorum count.
    pub async fn set_quorum_count(&self, count: u8) {
        self.state.lock().await.quorum_count = Some(count);
    }

    /// Fail the next `times` quorum count reads.
    pub async fn fail_quorum_count(&self, times: usize) {
        self.state.lock().await.quorum_count_failures = times;
    }

    /// Fail the next `times` membership reads of `quorum`.
    pub async fn fail_reads(&self, quorum: QuorumId, times: usize) {
        self.state.lock().await.read_failures.insert(quorum, times);
    }

    /// Apply `fault` to the next `times` writes for `quorum`.
    pub async fn fault_writes(&self, quorum: QuorumId, fault: WriteFault, times: usize) {
        let mut state = self.state.lock().await;
        let queue = state.write_faults.entry(quorum).or_default();
        queue.extend(std::iter::repeat(fault).take(times));
    }

    /// Apply `fault` to the next `times` subset writes.
    pub async fn fault_subset_writes(&self, fault: WriteFault, times: usize) {
        self.state
            .lock()
            .await
            .subset_faults
            .extend(std::iter::repeat(fault).take(times));
    }

    /// Delay every write by `delay` before it settles.
    pub async fn set_write_delay(&self, delay: Duration) {
        self.state.lock().await.write_delay = Some(delay);
    }

    /// Every call made so far, in order.
    pub async fn calls(&self) -> Vec<ChainCall> {
        self.state.lock().await.calls.clone()
    }

    /// Number of writes submitted so far.
    pub async fn write_count(&self) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.is_write())
            .count()
    }

    async fn delay_write(&self) {
        let delay = self.state.lock().await.write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ChainClient for InMemoryChainClient {
    async fn quorum_count(&self) -> Result<u8> {
        let mut state = self.state.lock().await;
        state.calls.push(ChainCall::QuorumCount);

        if state.quorum_count_failures > 0 {
            state.quorum_count_failures -= 1;
            return Err(Error::read_failed("scripted quorum count failure"));
        }

        let derived = u8::try_from(state.membership.len()).unwrap_or(u8::MAX);
        Ok(state.quorum_count.unwrap_or(derived))
    }

    async fn operators_in_quorum(&self, quorum: QuorumId) -> Result<Vec<Address>> {
        let mut state = self.state.lock().await;
        state.calls.push(ChainCall::OperatorsInQuorum(quorum));

        if let Some(remaining) = state.read_failures.get_mut(&quorum) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::read_failed(format!(
                    "scripted read failure for quorum {quorum}"
                )));
            }
        }

        if let Some(queued) = state
            .queued_membership
            .get_mut(&quorum)
            .and_then(VecDeque::pop_front)
        {
            return Ok(queued);
        }

        Ok(state.membership.get(&quorum).cloned().unwrap_or_default())
    }

    async fn update_stakes_for_quorum(
        &self,
        operators: &OperatorSet,
        quorum: QuorumId,
    ) -> Result<Receipt> {
        self.state
            .lock()
            .await
            .calls
            .push(ChainCall::UpdateStakesForQuorum {
                quorum,
                operators: operators.as_slice().to_vec(),
            });

        self.delay_write().await;

        let mut state = self.state.lock().await;
        let fault = state
            .write_faults
            .get_mut(&quorum)
            .and_then(VecDeque::pop_front);
        debug!(quorum = %quorum, ?fault, "In-memory quorum stake update");
        state.settle(fault)
    }

    async fn update_stakes_for_operator_subset(&self, operators: &[Address]) -> Result<Receipt> {
        self.state
            .lock()
            .await
            .calls
            .push(ChainCall::UpdateStakesForOperatorSubset {
                operators: operators.to_vec(),
            });

        self.delay_write().await;

        let mut state = self.state.lock().await;
        let fault = state.subset_faults.pop_front();
        debug!(operators = operators.len(), ?fault, "In-memory subset stake update");
        state.settle(fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(v: u64) -> Address {
        Address::from_low_u64(v)
    }

    #[tokio::test]
    async fn test_quorum_count_derived_from_membership() {
        let chain = InMemoryChainClient::new();
        chain.set_membership(QuorumId::new(0), vec![addr(1)]).await;
        chain.set_membership(QuorumId::new(1), vec![addr(2)]).await;

        assert_eq!(chain.quorum_count().await.ok(), Some(2));

        chain.set_quorum_count(5).await;
        assert_eq!(chain.quorum_count().await.ok(), Some(5));
    }

    #[tokio::test]
    async fn test_scripted_read_failures_are_consumed() {
        let chain = InMemoryChainClient::new();
        let quorum = QuorumId::new(0);
        chain.set_membership(quorum, vec![addr(1)]).await;
        chain.fail_reads(quorum, 1).await;

        assert!(chain.operators_in_quorum(quorum).await.is_err());
        assert_eq!(chain.operators_in_quorum(quorum).await.ok(), Some(vec![addr(1)]));
    }

    #[tokio::test]
    async fn test_queued_membership_served_before_stable() {
        let chain = InMemoryChainClient::new();
        let quorum = QuorumId::new(3);
        chain.set_membership(quorum, vec![addr(1), addr(2)]).await;
        chain.queue_membership(quorum, vec![addr(1)]).await;

        assert_eq!(chain.operators_in_quorum(quorum).await.ok(), Some(vec![addr(1)]));
        assert_eq!(
            chain.operators_in_quorum(quorum).await.ok(),
            Some(vec![addr(1), addr(2)])
        );
    }

    #[tokio::test]
    async fn test_write_faults_then_success() {
        let chain = InMemoryChainClient::new();
        let quorum = QuorumId::new(0);
        chain.fault_writes(quorum, WriteFault::Error, 1).await;
        chain.fault_writes(quorum, WriteFault::Revert, 1).await;
        let set = OperatorSet::from_fetched(vec![addr(1)]);

        assert!(chain.update_stakes_for_quorum(&set, quorum).await.is_err());
        let reverted = chain.update_stakes_for_quorum(&set, quorum).await.ok();
        assert_eq!(reverted.map(|r| r.is_successful()), Some(false));
        let ok = chain.update_stakes_for_quorum(&set, quorum).await.ok();
        assert_eq!(ok.map(|r| r.is_successful()), Some(true));

        assert_eq!(chain.write_count().await, 3);
    }

    #[tokio::test]
    async fn test_call_log_records_order() {
        let chain = InMemoryChainClient::new();
        let _ = chain.quorum_count().await;
        let _ = chain.update_stakes_for_operator_subset(&[addr(9)]).await;

        assert_eq!(
            chain.calls().await,
            vec![
                ChainCall::QuorumCount,
                ChainCall::UpdateStakesForOperatorSubset {
                    operators: vec![addr(9)]
                },
            ]
        );
    }
}
