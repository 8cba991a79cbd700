use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

use super::{MetricsSink, UpdateStakeStatus};
use crate::error::{Error, Result};
use crate::types::{AttemptOutcome, QuorumId};

const NAMESPACE: &str = "avssync";

/// Prometheus-backed metrics on a registry owned by this instance.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    update_stake_attempt: IntCounterVec,
    tx_reverted_total: IntCounter,
    operators_updated: IntGaugeVec,
    attempt_outcomes: IntCounterVec,
}

impl PrometheusMetrics {
    /// Create the metrics on a fresh registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric descriptor is invalid or registered twice.
    pub fn new() -> Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Register the metrics on an existing registry.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the metrics is already registered.
    pub fn with_registry(registry: Registry) -> Result<Self> {
        let update_stake_attempt = IntCounterVec::new(
            Opts::new(
                "update_stake_attempt",
                "Result from an update stake attempt. Either succeed or error (either tx was mined but reverted, or failed to get processed by chain).",
            )
            .namespace(NAMESPACE),
            &["status", "quorum"],
        )?;

        let tx_reverted_total = IntCounter::with_opts(
            Opts::new(
                "tx_reverted_total",
                "The total number of transactions that made it onchain but reverted",
            )
            .namespace(NAMESPACE),
        )?;

        let operators_updated = IntGaugeVec::new(
            Opts::new(
                "operators_updated",
                "The total number of operators updated (during the last quorum sync)",
            )
            .namespace(NAMESPACE),
            &["quorum"],
        )?;

        let attempt_outcomes = IntCounterVec::new(
            Opts::new(
                "attempt_outcomes_total",
                "Individual fetch/submit attempts per quorum by result",
            )
            .namespace(NAMESPACE),
            &["quorum", "result"],
        )?;

        registry.register(Box::new(update_stake_attempt.clone()))?;
        registry.register(Box::new(tx_reverted_total.clone()))?;
        registry.register(Box::new(operators_updated.clone()))?;
        registry.register(Box::new(attempt_outcomes.clone()))?;

        Ok(Self {
            registry,
            update_stake_attempt,
            tx_reverted_total,
            operators_updated,
            attempt_outcomes,
        })
    }

    /// The registry holding these metrics.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::metrics(e.to_string()))
    }
}

impl MetricsSink for PrometheusMetrics {
    fn increment_update_attempt(&self, status: UpdateStakeStatus, quorum: QuorumId) {
        self.update_stake_attempt
            .with_label_values(&[status.as_str(), &quorum.to_string()])
            .inc();
    }

    fn increment_tx_reverted(&self) {
        self.tx_reverted_total.inc();
    }

    fn set_operators_updated(&self, quorum: QuorumId, count: usize) {
        self.operators_updated
            .with_label_values(&[&quorum.to_string()])
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    fn record_attempt(&self, outcome: &AttemptOutcome) {
        self.attempt_outcomes
            .with_label_values(&[&outcome.quorum.to_string(), outcome.result.as_str()])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttemptResult;

    #[test]
    fn test_instances_do_not_share_state() {
        let first = PrometheusMetrics::new();
        let second = PrometheusMetrics::new();
        assert!(first.is_ok());
        assert!(second.is_ok());

        if let (Ok(first), Ok(second)) = (first, second) {
            first.increment_tx_reverted();
            assert_eq!(first.tx_reverted_total.get(), 1);
            assert_eq!(second.tx_reverted_total.get(), 0);
        }
    }

    #[test]
    fn test_render_contains_labelled_series() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let metrics = PrometheusMetrics::new()?;
        let quorum = QuorumId::new(1);

        metrics.increment_update_attempt(UpdateStakeStatus::Succeed, quorum);
        metrics.set_operators_updated(quorum, 12);
        metrics.record_attempt(&AttemptOutcome::new(quorum, 1, AttemptResult::Success));

        let text = metrics.render()?;
        assert!(text.contains(r#"avssync_update_stake_attempt{quorum="1",status="succeed"} 1"#));
        assert!(text.contains(r#"avssync_operators_updated{quorum="1"} 12"#));
        assert!(text.contains(r#"avssync_attempt_outcomes_total{quorum="1",result="success"} 1"#));
        Ok(())
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        assert!(PrometheusMetrics::with_registry(registry.clone()).is_ok());
        assert!(matches!(
            PrometheusMetrics::with_registry(registry),
            Err(Error::Metrics { .. })
        ));
    }
}
