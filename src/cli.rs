//! CLI definitions using clap.

use std::path::PathBuf;
use std::time::Duration;

use avs_sync_core::{Address, QuorumId};
use avs_sync_reconciler::{RetryPolicy, SyncConfig};
use chrono::NaiveTime;
use clap::Parser;
use url::Url;

use crate::logging::LogFormat;

/// avs-sync - keeps AVS registry stakes in sync with the staking ledger
#[derive(Parser, Debug)]
#[command(name = "avs-sync")]
#[command(version)]
#[command(about = "Periodically pushes fresh operator stakes into an AVS registry")]
pub struct Cli {
    /// Base URL of the registry gateway
    #[arg(long, env = "AVS_SYNC_REGISTRY_GATEWAY_URL")]
    pub registry_gateway_url: Url,

    /// Seconds between syncs. 0 syncs once and exits
    #[arg(long, env = "AVS_SYNC_SYNC_INTERVAL", default_value_t = 86_400)]
    pub sync_interval: u64,

    /// HH:MM:SS local time of the first sync
    #[arg(long, env = "AVS_SYNC_FIRST_SYNC_TIME", value_parser = parse_time_of_day)]
    pub first_sync_time: Option<NaiveTime>,

    /// Operators to update. Empty updates every quorum's entire operator set
    #[arg(long, env = "AVS_SYNC_OPERATORS", value_delimiter = ',')]
    pub operators: Vec<Address>,

    /// Quorums to update when not fetching them dynamically
    #[arg(long, env = "AVS_SYNC_QUORUMS", value_delimiter = ',')]
    pub quorums: Vec<QuorumId>,

    /// Read the quorum count from the registry every cycle and update all of them
    #[arg(long, env = "AVS_SYNC_FETCH_QUORUMS_DYNAMICALLY", default_value_t = false)]
    pub fetch_quorums_dynamically: bool,

    /// Attempts per quorum before giving up
    #[arg(long, env = "AVS_SYNC_RETRY_SYNC_N_TIMES", default_value_t = 3)]
    pub retry_sync_n_times: u32,

    /// Seconds to wait between attempts
    #[arg(long, env = "AVS_SYNC_RETRY_BACKOFF", default_value_t = 0)]
    pub retry_backoff: u64,

    /// Timeout for chain reads in seconds
    #[arg(long, env = "AVS_SYNC_READER_TIMEOUT_DURATION", default_value_t = 5)]
    pub reader_timeout_duration: u64,

    /// Timeout for transaction confirmation in seconds
    #[arg(long, env = "AVS_SYNC_WRITER_TIMEOUT_DURATION", default_value_t = 90)]
    pub writer_timeout_duration: u64,

    /// Log level or filter directives
    #[arg(long = "log.level", env = "AVS_SYNC_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long = "log.format", env = "AVS_SYNC_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    /// Also append logs to this file
    #[arg(long = "log.path", env = "AVS_SYNC_LOG_PATH")]
    pub log_path: Option<PathBuf>,
}

impl Cli {
    /// Engine configuration for these flags.
    #[must_use]
    pub fn sync_config(&self, initial_delay: Duration) -> SyncConfig {
        SyncConfig::for_quorums(self.quorums.iter().copied())
            .operators(self.operators.iter().copied())
            .fetch_quorums_dynamically(self.fetch_quorums_dynamically)
            .retry_limit(self.retry_sync_n_times)
            .retry_policy(RetryPolicy::fixed(Duration::from_secs(self.retry_backoff)))
            .sync_interval(Duration::from_secs(self.sync_interval))
            .initial_delay(initial_delay)
            .read_timeout(Duration::from_secs(self.reader_timeout_duration))
            .write_timeout(Duration::from_secs(self.writer_timeout_duration))
    }
}

fn parse_time_of_day(input: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(input, "%H:%M:%S")
        .map_err(|e| format!("expected HH:MM:SS, got '{input}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use avs_sync_reconciler::SyncMode;

    fn parse(args: &[&str]) -> Option<Cli> {
        let mut argv = vec!["avs-sync", "--registry-gateway-url", "http://localhost:8080"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).ok()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert!(cli.is_some());
        let config = cli.map(|c| c.sync_config(Duration::ZERO));

        assert_eq!(
            config.as_ref().map(|c| c.sync_interval),
            Some(Duration::from_secs(86_400))
        );
        assert_eq!(config.as_ref().map(|c| c.retry_limit), Some(3));
        assert_eq!(
            config.as_ref().map(|c| c.retry_policy),
            Some(RetryPolicy::Immediate)
        );
        assert_eq!(
            config.as_ref().map(|c| c.read_timeout),
            Some(Duration::from_secs(5))
        );
        assert_eq!(
            config.as_ref().map(|c| c.write_timeout),
            Some(Duration::from_secs(90))
        );
    }

    #[test]
    fn test_gateway_url_is_required() {
        assert!(Cli::try_parse_from(["avs-sync"]).is_err());
    }

    #[test]
    fn test_operator_list_selects_subset_mode() {
        let cli = parse(&[
            "--operators",
            "0x0000000000000000000000000000000000000002,0000000000000000000000000000000000000001",
            "--quorums",
            "0,1",
        ]);
        let config = cli.map(|c| c.sync_config(Duration::ZERO));

        assert_eq!(config.as_ref().map(SyncConfig::mode), Some(SyncMode::Subset));
        assert_eq!(
            config.map(|c| c.operators.into_vec()),
            Some(vec![Address::from_low_u64(1), Address::from_low_u64(2)])
        );
    }

    #[test]
    fn test_rejects_malformed_address() {
        assert!(parse(&["--operators", "0x1234"]).is_none());
    }

    #[test]
    fn test_rejects_out_of_range_quorum() {
        assert!(parse(&["--quorums", "256"]).is_none());
    }

    #[test]
    fn test_first_sync_time() {
        let cli = parse(&["--first-sync-time", "03:30:00"]);
        assert_eq!(
            cli.and_then(|c| c.first_sync_time),
            NaiveTime::from_hms_opt(3, 30, 0)
        );
        assert!(parse(&["--first-sync-time", "3pm"]).is_none());
    }

    #[test]
    fn test_backoff_and_dynamic_quorums() {
        let cli = parse(&[
            "--fetch-quorums-dynamically",
            "--retry-backoff",
            "12",
            "--sync-interval",
            "0",
        ]);
        let config = cli.map(|c| c.sync_config(Duration::from_secs(7)));

        assert_eq!(
            config.as_ref().map(|c| c.fetch_quorums_dynamically),
            Some(true)
        );
        assert_eq!(
            config.as_ref().map(|c| c.retry_policy),
            Some(RetryPolicy::fixed(Duration::from_secs(12)))
        );
        assert_eq!(config.as_ref().map(SyncConfig::is_one_shot), Some(true));
        assert_eq!(
            config.map(|c| c.initial_delay),
            Some(Duration::from_secs(7))
        );
    }

    #[test]
    fn test_log_flags() {
        let cli = parse(&["--log.level", "debug", "--log.format", "text", "--log.path", "/tmp/avs.log"]);
        assert_eq!(cli.as_ref().map(|c| c.log_level.as_str()), Some("debug"));
        assert_eq!(cli.as_ref().map(|c| c.log_format), Some(LogFormat::Text));
        assert_eq!(
            cli.and_then(|c| c.log_path),
            Some(PathBuf::from("/tmp/avs.log"))
        );
    }
}
