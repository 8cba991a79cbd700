//! Per-call timeouts for chain access.

use std::future::Future;
use std::time::Duration;

use avs_sync_core::{Error, Result};

/// Run a chain call with its own deadline.
///
/// The deadline is independent of scheduler cancellation; an elapsed
/// deadline surfaces as [`Error::Timeout`].
pub(crate) async fn bounded<T, F>(limit: Duration, operation: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(
            operation,
            u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_call_becomes_timeout() {
        let result: Result<()> = bounded(Duration::from_secs(1), "slow read", async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

        assert_eq!(result, Err(Error::timeout("slow read", 1000)));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<u8> = bounded(Duration::from_secs(1), "read", async {
            Err(Error::read_failed("boom"))
        })
        .await;

        assert_eq!(result, Err(Error::read_failed("boom")));
    }
}
