//! Core types and capabilities for avs-sync.
//!
//! - [`types`]: addresses, quorum identifiers, operator sets, receipts.
//! - [`chain`]: the [`ChainClient`] capability the reconciler reads from and
//!   writes to, plus an in-memory registry for tests and dry runs.
//! - [`metrics`]: the [`MetricsSink`] capability and its backends.

pub mod chain;
pub mod error;
pub mod metrics;
pub mod types;

pub use chain::{ChainCall, ChainClient, InMemoryChainClient, WriteFault};
pub use error::{Error, Result};
pub use metrics::{InMemoryMetrics, MetricsSink, NoopMetrics, PrometheusMetrics, UpdateStakeStatus};
pub use types::{
    Address, AttemptOutcome, AttemptResult, OperatorSet, QuorumId, Receipt, ReceiptStatus,
};
