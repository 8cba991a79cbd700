//! Configuration for a sync run.

use std::time::Duration;

use avs_sync_core::{Address, OperatorSet, QuorumId};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::SyncMode;

/// Delay policy between a failed attempt and the next fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Retry straight away.
    #[default]
    Immediate,
    /// Wait a fixed delay before every retry.
    Fixed {
        #[serde(with = "duration_secs")]
        delay: Duration,
    },
}

impl RetryPolicy {
    /// Delay for a fixed policy, or immediate for zero.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        if delay.is_zero() {
            Self::Immediate
        } else {
            Self::Fixed { delay }
        }
    }

    /// How long to wait before the given (1-based) attempt.
    #[must_use]
    pub const fn delay_before(&self, _attempt: u32) -> Duration {
        match self {
            Self::Immediate => Duration::ZERO,
            Self::Fixed { delay } => *delay,
        }
    }
}

/// Configuration of the reconciliation engine.
///
/// Immutable once the engine is built; only the resolved quorum list changes
/// between cycles, and that lives in the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Operators to update. Empty means the whole operator set of every quorum.
    #[serde(default)]
    pub operators: OperatorSet,

    /// Quorums to update when not fetching them from the contract.
    #[serde(default)]
    pub quorums: Vec<QuorumId>,

    /// Read the quorum count from the contract every full-set cycle.
    #[serde(default)]
    pub fetch_quorums_dynamically: bool,

    /// Attempts per quorum per cycle.
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,

    /// Delay between attempts.
    #[serde(default)]
    pub retry_policy: RetryPolicy,

    /// Period between cycles. Zero runs a single cycle.
    #[serde(with = "duration_secs", default = "default_sync_interval")]
    pub sync_interval: Duration,

    /// Wait before the first cycle.
    #[serde(with = "duration_secs", default)]
    pub initial_delay: Duration,

    /// Bound on every chain read.
    #[serde(with = "duration_secs", default = "default_read_timeout")]
    pub read_timeout: Duration,

    /// Bound on every chain write, including confirmation.
    #[serde(with = "duration_secs", default = "default_write_timeout")]
    pub write_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            operators: OperatorSet::default(),
            quorums: Vec::new(),
            fetch_quorums_dynamically: false,
            retry_limit: default_retry_limit(),
            retry_policy: RetryPolicy::default(),
            sync_interval: default_sync_interval(),
            initial_delay: Duration::ZERO,
            read_timeout: default_read_timeout(),
            write_timeout: default_write_timeout(),
        }
    }
}

impl SyncConfig {
    /// Full-set sync of a static quorum list.
    pub fn for_quorums(quorums: impl IntoIterator<Item = QuorumId>) -> Self {
        Self {
            quorums: quorums.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Full-set sync of every quorum registered in the contract.
    #[must_use]
    pub fn dynamic() -> Self {
        Self {
            fetch_quorums_dynamically: true,
            ..Default::default()
        }
    }

    /// Set the operator subset to update.
    #[must_use]
    pub fn operators(mut self, operators: impl IntoIterator<Item = Address>) -> Self {
        self.operators = OperatorSet::from_fetched(operators);
        self
    }

    /// Set the static quorum list.
    #[must_use]
    pub fn quorums(mut self, quorums: impl IntoIterator<Item = QuorumId>) -> Self {
        self.quorums = quorums.into_iter().collect();
        self
    }

    /// Enable or disable dynamic quorum fetching.
    #[must_use]
    pub const fn fetch_quorums_dynamically(mut self, enabled: bool) -> Self {
        self.fetch_quorums_dynamically = enabled;
        self
    }

    /// Set the retry limit.
    #[must_use]
    pub const fn retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = limit;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub const fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set the sync interval.
    #[must_use]
    pub const fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Set the initial delay.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the write timeout.
    #[must_use]
    pub const fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Which reconciliation path this configuration selects.
    #[must_use]
    pub fn mode(&self) -> SyncMode {
        if self.operators.is_empty() {
            SyncMode::FullSet
        } else {
            SyncMode::Subset
        }
    }

    /// Whether the scheduler runs exactly one cycle.
    #[must_use]
    pub const fn is_one_shot(&self) -> bool {
        self.sync_interval.is_zero()
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a timeout is zero, or if full-set
    /// mode has neither a static quorum list nor dynamic fetching.
    pub fn validate(&self) -> Result<()> {
        if self.read_timeout.is_zero() {
            return Err(Error::invalid_config("read timeout must be non-zero"));
        }
        if self.write_timeout.is_zero() {
            return Err(Error::invalid_config("write timeout must be non-zero"));
        }
        if self.mode() == SyncMode::FullSet
            && self.quorums.is_empty()
            && !self.fetch_quorums_dynamically
        {
            return Err(Error::invalid_config(
                "updating the entire operator set needs a quorum list or dynamic quorum fetching",
            ));
        }
        Ok(())
    }
}

const fn default_retry_limit() -> u32 {
    3
}

const fn default_sync_interval() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

const fn default_read_timeout() -> Duration {
    Duration::from_secs(5)
}

const fn default_write_timeout() -> Duration {
    Duration::from_secs(90)
}

/// Serialization helper for Duration as seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
