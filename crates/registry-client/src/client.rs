//! Registry gateway client.
//!
//! The gateway owns the node connection, the signer and the contract ABI.
//! This client only speaks its small JSON API.

use std::sync::Arc;

use async_trait::async_trait;
use avs_sync_core::{Address, ChainClient, OperatorSet, QuorumId, Receipt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::RegistryGatewayConfig;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct QuorumCountResponse {
    count: u8,
}

#[derive(Debug, Deserialize)]
struct OperatorsResponse {
    operators: Vec<Address>,
}

#[derive(Debug, Serialize)]
struct StakeUpdateRequest<'a> {
    operators: &'a [Address],
}

/// [`ChainClient`] backed by a registry gateway over HTTP.
#[derive(Debug, Clone)]
pub struct RegistryGatewayClient {
    config: Arc<RegistryGatewayConfig>,
    http_client: reqwest::Client,
}

impl RegistryGatewayClient {
    /// Create a client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(config: RegistryGatewayConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            http_client,
        })
    }

    /// Create a client for a gateway URL with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is unusable or the HTTP client cannot be built.
    pub fn with_url(base_url: Url) -> Result<Self> {
        Self::new(RegistryGatewayConfig::new(base_url)?)
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &RegistryGatewayConfig {
        &self.config
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.config.endpoint(path)?;
        debug!(url = %url, "GET registry gateway");

        let response = self.http_client.get(url).send().await?;
        decode(response).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.config.endpoint(path)?;
        debug!(url = %url, "POST registry gateway");

        let response = self.http_client.post(url).json(body).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(Error::status(status.as_u16(), body));
    }

    serde_json::from_str(&body).map_err(|e| Error::invalid_response(format!("{e}: {body}")))
}

#[async_trait]
impl ChainClient for RegistryGatewayClient {
    async fn quorum_count(&self) -> avs_sync_core::Result<u8> {
        self.get::<QuorumCountResponse>("quorums/count")
            .await
            .map(|r| r.count)
            .map_err(Error::into_read_error)
    }

    async fn operators_in_quorum(&self, quorum: QuorumId) -> avs_sync_core::Result<Vec<Address>> {
        self.get::<OperatorsResponse>(&format!("quorums/{}/operators", quorum.get()))
            .await
            .map(|r| r.operators)
            .map_err(Error::into_read_error)
    }

    async fn update_stakes_for_quorum(
        &self,
        operators: &OperatorSet,
        quorum: QuorumId,
    ) -> avs_sync_core::Result<Receipt> {
        let request = StakeUpdateRequest {
            operators: operators.as_slice(),
        };
        self.post(&format!("quorums/{}/stakes", quorum.get()), &request)
            .await
            .map_err(Error::into_write_error)
    }

    async fn update_stakes_for_operator_subset(
        &self,
        operators: &[Address],
    ) -> avs_sync_core::Result<Receipt> {
        self.post("operators/stakes", &StakeUpdateRequest { operators })
            .await
            .map_err(Error::into_write_error)
    }
}
