//! Stake reconciliation for AVS registries.
//!
//! The registry contract keeps a stake snapshot per operator that goes
//! stale as the staking ledger changes. This crate periodically pushes
//! fresh stakes back into the registry:
//!
//! - **Full-set mode**: for each quorum, read its members and submit one
//!   update covering exactly that set. A failed or reverted attempt re-reads
//!   the members before retrying, up to a bounded number of attempts.
//! - **Subset mode**: submit one transaction for a configured operator list
//!   across all quorums. No retries; the next cycle starts over.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use avs_sync_core::{InMemoryChainClient, InMemoryMetrics};
//! use avs_sync_reconciler::{Schedule, StakeReconciler, SyncConfig, SyncScheduler};
//!
//! #[tokio::main]
//! async fn main() -> avs_sync_reconciler::Result<()> {
//!     let config = SyncConfig::dynamic().sync_interval(Duration::from_secs(3600));
//!     let schedule = Schedule::from(&config);
//!
//!     let reconciler = StakeReconciler::builder()
//!         .with_chain(Arc::new(InMemoryChainClient::new()))
//!         .with_metrics(Arc::new(InMemoryMetrics::new()))
//!         .with_config(config)
//!         .build()?;
//!
//!     let mut scheduler = SyncScheduler::new(reconciler, schedule);
//!     let stopper = scheduler.stopper();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         stopper.stop();
//!     });
//!
//!     scheduler.run().await;
//!     Ok(())
//! }
//! ```

mod bounded;
pub mod config;
pub mod error;
pub mod quorum;
pub mod reconciler;
pub mod resolver;
pub mod scheduler;
pub mod subset;
pub mod types;

pub use config::{RetryPolicy, SyncConfig};
pub use error::{Error, Result};
pub use quorum::QuorumReconciler;
pub use reconciler::{StakeReconciler, StakeReconcilerBuilder};
pub use resolver::QuorumResolver;
pub use scheduler::{Schedule, SchedulerStopper, SyncCycle, SyncScheduler};
pub use subset::SubsetReconciler;
pub use types::{CycleReport, QuorumOutcome, QuorumSyncState, SubsetOutcome, SyncMode};
