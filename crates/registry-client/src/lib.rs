//! HTTP client for an AVS registry gateway.
//!
//! Implements [`avs_sync_core::ChainClient`] against a gateway that exposes
//! the registry contract's quorum reads and stake update writes as JSON
//! endpoints.

pub mod client;
pub mod config;
pub mod error;

pub use client::RegistryGatewayClient;
pub use config::RegistryGatewayConfig;
pub use error::{Error, Result};
