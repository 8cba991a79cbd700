//! # avs-sync
//!
//! Keeps the stake snapshot in an AVS registry contract in step with the
//! staking ledger.
//!
//! ## Startup
//!
//! 1. Parse flags and install logging
//! 2. Work out when the first sync happens
//! 3. Connect the registry gateway and metrics
//! 4. Run the sync scheduler until SIGINT/SIGTERM, or once with a zero interval
//!
//! A signal never interrupts a sync in flight; the scheduler exits once the
//! current cycle finishes.

#![forbid(unsafe_code)]

mod cli;
mod first_sync;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use avs_sync_core::PrometheusMetrics;
use avs_sync_reconciler::{Schedule, StakeReconciler, SyncScheduler};
use avs_sync_registry_client::{RegistryGatewayClient, RegistryGatewayConfig};
use chrono::Local;
use clap::Parser;
use tracing::{debug, error, info};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_format, cli.log_path.as_deref())?;

    let initial_delay = match cli.first_sync_time {
        Some(at) => {
            let delay = first_sync::delay_until(Local::now().naive_local(), at);
            info!(
                delay_secs = delay.as_secs(),
                first_sync_at = %at,
                "Sleeping before first sync"
            );
            delay
        }
        None => Duration::ZERO,
    };

    let config = cli.sync_config(initial_delay);
    info!(
        registry_gateway_url = %cli.registry_gateway_url,
        initial_delay_secs = config.initial_delay.as_secs(),
        sync_interval_secs = config.sync_interval.as_secs(),
        operators = ?config.operators.as_slice(),
        quorums = ?config.quorums,
        fetch_quorums_dynamically = config.fetch_quorums_dynamically,
        retry_limit = config.retry_limit,
        retry_policy = ?config.retry_policy,
        read_timeout_secs = config.read_timeout.as_secs(),
        write_timeout_secs = config.write_timeout.as_secs(),
        "Starting avs sync"
    );

    let gateway = RegistryGatewayConfig::new(cli.registry_gateway_url.clone())
        .context("Invalid registry gateway URL")?
        .timeout(config.read_timeout.max(config.write_timeout));
    let chain = Arc::new(
        RegistryGatewayClient::new(gateway).context("Failed to create registry gateway client")?,
    );
    let metrics = Arc::new(PrometheusMetrics::new().context("Failed to register metrics")?);

    let schedule = Schedule::from(&config);
    let reconciler = StakeReconciler::builder()
        .with_chain(chain)
        .with_metrics(metrics.clone())
        .with_config(config)
        .build()
        .context("Invalid sync configuration")?;

    let mut scheduler = SyncScheduler::new(reconciler, schedule);
    let stopper = scheduler.stopper();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        stopper.stop();
    });

    let cycles = scheduler.run().await;

    match metrics.render() {
        Ok(text) => debug!(metrics = %text, "Final metrics"),
        Err(e) => error!(error = %e, "Failed to render metrics"),
    }
    info!(cycles, "avs sync stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            error!("Failed to listen for SIGTERM: {}", err);
            return wait_for_ctrl_c().await;
        }
    };

    tokio::select! {
        () = wait_for_ctrl_c() => {}
        _ = sigterm.recv() => info!("Received SIGTERM, stopping after the current sync"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, stopping after the current sync"),
        Err(err) => {
            error!("Failed to listen for shutdown signal: {}", err);
            std::future::pending::<()>().await;
        }
    }
}
