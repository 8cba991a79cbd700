//! Quorum set resolution.

use std::sync::Arc;
use std::time::Duration;

use avs_sync_core::{ChainClient, QuorumId};
use tracing::{error, info};

use crate::bounded::bounded;
use crate::config::SyncConfig;

/// Determines which quorums a full-set cycle reconciles.
///
/// With dynamic fetching the list is `[0, count)` as reported by the
/// contract. A failed count read keeps the list from the previous cycle.
pub struct QuorumResolver {
    chain: Arc<dyn ChainClient>,
    fetch_dynamically: bool,
    read_timeout: Duration,
    current: Vec<QuorumId>,
}

impl QuorumResolver {
    /// Create a resolver seeded with the configured quorum list.
    pub fn new(chain: Arc<dyn ChainClient>, config: &SyncConfig) -> Self {
        Self {
            chain,
            fetch_dynamically: config.fetch_quorums_dynamically,
            read_timeout: config.read_timeout,
            current: config.quorums.clone(),
        }
    }

    /// The most recently resolved quorum list.
    #[must_use]
    pub fn current(&self) -> &[QuorumId] {
        &self.current
    }

    /// Resolve the quorum list for this cycle.
    pub async fn resolve(&mut self) -> Vec<QuorumId> {
        if !self.fetch_dynamically {
            return self.current.clone();
        }

        info!("Fetching quorum set dynamically");
        match bounded(self.read_timeout, "read quorum count", self.chain.quorum_count()).await {
            Ok(count) => {
                self.current = QuorumId::first_n(count).collect();
            }
            Err(e) => {
                error!(
                    error = %e,
                    previous = ?self.current,
                    "Error fetching quorum set dynamically, keeping previous quorum set"
                );
            }
        }

        self.current.clone()
    }
}
