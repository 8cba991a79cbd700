//! Reconciler implementation.

use std::sync::Arc;

use async_trait::async_trait;
use avs_sync_core::{ChainClient, MetricsSink, NoopMetrics};
use tracing::info;

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::quorum::QuorumReconciler;
use crate::resolver::QuorumResolver;
use crate::scheduler::SyncCycle;
use crate::subset::SubsetReconciler;
use crate::types::{CycleReport, SyncMode};

/// Brings on-chain stakes in line with the staking ledger, one cycle at a time.
///
/// Full-set mode resolves the quorum list and reconciles each quorum in
/// order, one at a time. Subset mode submits one transaction for the
/// configured operators.
pub struct StakeReconciler {
    config: SyncConfig,
    resolver: QuorumResolver,
    quorum: QuorumReconciler,
    subset: SubsetReconciler,
}

impl StakeReconciler {
    /// Create a reconciler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration does not validate.
    pub fn new(
        chain: Arc<dyn ChainClient>,
        metrics: Arc<dyn MetricsSink>,
        config: SyncConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            resolver: QuorumResolver::new(chain.clone(), &config),
            quorum: QuorumReconciler::new(chain.clone(), metrics.clone(), &config),
            subset: SubsetReconciler::new(chain, metrics, &config),
            config,
        })
    }

    /// Start building a reconciler.
    #[must_use]
    pub fn builder() -> StakeReconcilerBuilder {
        StakeReconcilerBuilder::new()
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Which path each cycle takes.
    #[must_use]
    pub fn mode(&self) -> SyncMode {
        self.config.mode()
    }

    /// Run one reconciliation cycle.
    pub async fn reconcile(&mut self) -> CycleReport {
        match self.mode() {
            SyncMode::FullSet => self.reconcile_full_set().await,
            SyncMode::Subset => self.reconcile_subset().await,
        }
    }

    async fn reconcile_full_set(&mut self) -> CycleReport {
        info!("Updating stakes of entire operator set");

        let quorums = self.resolver.resolve().await;
        info!(quorums = ?quorums, "Current quorum set");

        // one quorum at a time keeps each transaction within gas limits
        let mut outcomes = Vec::with_capacity(quorums.len());
        for quorum in &quorums {
            outcomes.push(self.quorum.reconcile(*quorum).await);
        }

        info!(
            succeeded = outcomes.iter().filter(|o| o.is_success()).count(),
            gave_up = outcomes.iter().filter(|o| !o.is_success()).count(),
            "Completed stake update. Check logs to make sure every quorum update succeeded successfully."
        );

        CycleReport::FullSet { quorums, outcomes }
    }

    async fn reconcile_subset(&self) -> CycleReport {
        let quorums = self.resolver.current().to_vec();
        let outcome = self
            .subset
            .update_subset(&self.config.operators, &quorums)
            .await;

        CycleReport::Subset {
            operators: self.config.operators.len(),
            quorums,
            outcome,
        }
    }
}

#[async_trait]
impl SyncCycle for StakeReconciler {
    async fn run_cycle(&mut self) -> Result<CycleReport> {
        Ok(self.reconcile().await)
    }
}

/// Builder for [`StakeReconciler`].
pub struct StakeReconcilerBuilder {
    chain: Option<Arc<dyn ChainClient>>,
    metrics: Option<Arc<dyn MetricsSink>>,
    config: SyncConfig,
}

impl StakeReconcilerBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chain: None,
            metrics: None,
            config: SyncConfig::default(),
        }
    }

    /// Set the chain client.
    #[must_use]
    pub fn with_chain(mut self, chain: Arc<dyn ChainClient>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Set the metrics sink. Defaults to [`NoopMetrics`].
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if no chain client was set or the
    /// configuration does not validate.
    pub fn build(self) -> Result<StakeReconciler> {
        let chain = self
            .chain
            .ok_or_else(|| Error::invalid_config("Chain client is required"))?;

        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(NoopMetrics));

        StakeReconciler::new(chain, metrics, self.config)
    }
}

impl Default for StakeReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
