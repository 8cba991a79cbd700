use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{MetricsSink, UpdateStakeStatus};
use crate::types::{AttemptOutcome, QuorumId};

#[derive(Debug, Default)]
struct Tally {
    update_attempts: HashMap<(UpdateStakeStatus, QuorumId), u64>,
    tx_reverted: u64,
    operators_updated: HashMap<QuorumId, usize>,
    attempts: Vec<AttemptOutcome>,
}

/// In-memory metrics sink for tests.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    tally: Mutex<Tally>,
}

impl InMemoryMetrics {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tally(&self) -> MutexGuard<'_, Tally> {
        self.tally.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Update-attempt count for a status and quorum.
    #[must_use]
    pub fn update_attempts(&self, status: UpdateStakeStatus, quorum: QuorumId) -> u64 {
        self.tally()
            .update_attempts
            .get(&(status, quorum))
            .copied()
            .unwrap_or(0)
    }

    /// Update-attempt count for a status across all quorums.
    #[must_use]
    pub fn total_update_attempts(&self, status: UpdateStakeStatus) -> u64 {
        self.tally()
            .update_attempts
            .iter()
            .filter(|((s, _), _)| *s == status)
            .map(|(_, n)| *n)
            .sum()
    }

    /// Reverted transaction count.
    #[must_use]
    pub fn tx_reverted(&self) -> u64 {
        self.tally().tx_reverted
    }

    /// Last operators-updated gauge value for a quorum.
    #[must_use]
    pub fn operators_updated(&self, quorum: QuorumId) -> Option<usize> {
        self.tally().operators_updated.get(&quorum).copied()
    }

    /// Every attempt recorded, in order.
    #[must_use]
    pub fn attempts(&self) -> Vec<AttemptOutcome> {
        self.tally().attempts.clone()
    }

    /// Attempts recorded for one quorum, in order.
    #[must_use]
    pub fn attempts_for(&self, quorum: QuorumId) -> Vec<AttemptOutcome> {
        self.tally()
            .attempts
            .iter()
            .filter(|a| a.quorum == quorum)
            .copied()
            .collect()
    }
}

impl MetricsSink for InMemoryMetrics {
    fn increment_update_attempt(&self, status: UpdateStakeStatus, quorum: QuorumId) {
        let mut tally = self.tally();
        let count = tally.update_attempts.entry((status, quorum)).or_insert(0);
        *count = count.saturating_add(1);
    }

    fn increment_tx_reverted(&self) {
        let mut tally = self.tally();
        tally.tx_reverted = tally.tx_reverted.saturating_add(1);
    }

    fn set_operators_updated(&self, quorum: QuorumId, count: usize) {
        self.tally().operators_updated.insert(quorum, count);
    }

    fn record_attempt(&self, outcome: &AttemptOutcome) {
        self.tally().attempts.push(*outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttemptResult;
    use std::sync::Arc;

    #[test]
    fn test_tallies_by_status_and_quorum() {
        let metrics = InMemoryMetrics::new();
        let q0 = QuorumId::new(0);
        let q1 = QuorumId::new(1);

        metrics.increment_update_attempt(UpdateStakeStatus::Succeed, q0);
        metrics.increment_update_attempt(UpdateStakeStatus::Error, q1);
        metrics.increment_update_attempt(UpdateStakeStatus::Error, q1);

        assert_eq!(metrics.update_attempts(UpdateStakeStatus::Succeed, q0), 1);
        assert_eq!(metrics.update_attempts(UpdateStakeStatus::Error, q1), 2);
        assert_eq!(metrics.update_attempts(UpdateStakeStatus::Error, q0), 0);
        assert_eq!(metrics.total_update_attempts(UpdateStakeStatus::Error), 2);
    }

    #[test]
    fn test_gauge_keeps_last_value() {
        let metrics = InMemoryMetrics::new();
        let quorum = QuorumId::new(2);
        metrics.set_operators_updated(quorum, 4);
        metrics.set_operators_updated(quorum, 7);
        assert_eq!(metrics.operators_updated(quorum), Some(7));
        assert_eq!(metrics.operators_updated(QuorumId::new(3)), None);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let metrics = Arc::new(InMemoryMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for attempt in 0..100 {
                        metrics.increment_tx_reverted();
                        metrics.record_attempt(&AttemptOutcome::new(
                            QuorumId::new(i),
                            attempt,
                            AttemptResult::Reverted,
                        ));
                    }
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().is_ok());
        }

        assert_eq!(metrics.tx_reverted(), 800);
        assert_eq!(metrics.attempts().len(), 800);
        assert_eq!(metrics.attempts_for(QuorumId::new(3)).len(), 100);
    }
}
