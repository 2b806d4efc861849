//! HTTP client for the decryption relayer gateway.
//!
//! The gateway exposes three JSON endpoints:
//! - `POST /keypair` returns a fresh [`RelayerKeypair`],
//! - `POST /eip712` returns the typed-data authorization to sign,
//! - `POST /user-decrypt` takes a [`UserDecryptRequest`] and returns a map of
//!   handle to decimal plaintext.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use ethers::types::transaction::eip712::TypedData;
use ethers::types::Address;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;
use vault_dashboard::chain::{RelayerClient, RelayerKeypair, UserDecryptRequest};
use vault_dashboard::{CiphertextHandle, VaultError};

use crate::error::EvmAdapterError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationRequest<'a> {
    public_key: &'a str,
    contract_addresses: &'a [Address],
    start_timestamp: &'a str,
    duration_days: &'a str,
}

/// Talks JSON to a relayer gateway over HTTP.
#[derive(Clone, Debug)]
pub struct HttpRelayerClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpRelayerClient {
    pub fn new(base_url: &str) -> Result<Self, EvmAdapterError> {
        Url::parse(base_url).map_err(|e| EvmAdapterError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, EvmAdapterError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%url, "relayer request");

        let response = self
            .client
            .post(&url)
            .json(body)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%url, status = status.as_u16(), "relayer rejected request");
            return Err(EvmAdapterError::Relayer {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<R>().await?)
    }
}

#[async_trait]
impl RelayerClient for HttpRelayerClient {
    async fn generate_keypair(&self) -> Result<RelayerKeypair, VaultError> {
        Ok(self.post("keypair", &serde_json::json!({})).await?)
    }

    async fn build_authorization_message(
        &self,
        public_key: &str,
        contract_addresses: &[Address],
        start_timestamp: &str,
        duration_days: &str,
    ) -> Result<TypedData, VaultError> {
        let request = AuthorizationRequest {
            public_key,
            contract_addresses,
            start_timestamp,
            duration_days,
        };
        Ok(self.post("eip712", &request).await?)
    }

    async fn request_decryption(
        &self,
        request: &UserDecryptRequest,
    ) -> Result<BTreeMap<CiphertextHandle, String>, VaultError> {
        let plaintexts: BTreeMap<CiphertextHandle, String> = self.post("user-decrypt", request).await?;
        debug!(handles = plaintexts.len(), "relayer returned plaintexts");
        Ok(plaintexts)
    }
}
