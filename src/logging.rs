//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Text,
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level` when set. With a `path`, every line goes to
/// stdout and is appended to the file.
pub fn init(level: &str, format: LogFormat, path: Option<&Path>) -> Result<()> {
    let filter = filter(level)?;
    let writer = writer(path)?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .try_init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(writer))
            .try_init(),
    }
    .context("Failed to install tracing subscriber")
}

fn filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("Invalid log level '{level}'")),
    }
}

fn writer(path: Option<&Path>) -> Result<BoxMakeWriter> {
    let Some(path) = path else {
        return Ok(BoxMakeWriter::new(std::io::stdout));
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    Ok(BoxMakeWriter::new(std::io::stdout.and(Arc::new(file))))
}
