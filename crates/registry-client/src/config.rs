//! Configuration for the registry gateway client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Configuration for [`RegistryGatewayClient`](crate::RegistryGatewayClient).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryGatewayConfig {
    /// Base URL of the gateway.
    pub base_url: Url,

    /// Upper bound on any single HTTP request. Callers normally apply
    /// tighter per-operation deadlines on top.
    #[serde(with = "duration_secs", default = "default_timeout")]
    pub timeout: Duration,
}

impl RegistryGatewayConfig {
    /// Create a config for the given gateway.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the URL cannot carry a path.
    pub fn new(base_url: Url) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(Error::config_error(format!(
                "gateway URL {base_url} cannot be used as a base"
            )));
        }
        Ok(Self {
            base_url,
            timeout: default_timeout(),
        })
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve an endpoint path relative to the base URL, keeping any path
    /// prefix the base carries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UrlParse`] if the joined URL is invalid.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        Ok(base.join(path.trim_start_matches('/'))?)
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(120)
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
