//! `EsploraClient` — a `reqwest`-backed `ExplorerClient` against an
//! Esplora-compatible HTTP API (SPEC_FULL §10.2).
//!
//! This is the workspace's sole point of network I/O: `btcr2-core` depends
//! only on the `ExplorerClient` trait, never on `reqwest` itself.

use std::time::Duration;

use async_trait::async_trait;
use btcr2_core::explorer::{AddressTransaction, AddressUtxo, ExplorerClient};
use btcr2_core::error::ResolverError;
use reqwest::StatusCode;
use tracing::{instrument, warn};

use crate::esplora::{EsploraTx, EsploraUtxo};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A single Esplora-backed explorer endpoint, scoped to one network.
pub struct EsploraClient {
    http: reqwest::Client,
    base_url: String,
}

impl EsploraClient {
    /// Build a client against `base_url` (e.g. `https://blockstream.info/api`),
    /// with the default per-request timeout.
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client configuration is valid");
        EsploraClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ResolverError> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(ResolverError::Explorer(format!(
            "HTTP {status}: {body}"
        )))
    }
}

#[async_trait]
impl ExplorerClient for EsploraClient {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn get_address_utxos(&self, address: &str) -> Result<Vec<AddressUtxo>, ResolverError> {
        let resp = self
            .http
            .get(self.url(&format!("/address/{address}/utxo")))
            .send()
            .await
            .map_err(|e| ResolverError::Explorer(e.to_string()))?;
        let resp = check_status(resp).await?;
        let utxos: Vec<EsploraUtxo> = resp
            .json()
            .await
            .map_err(|e| ResolverError::Explorer(e.to_string()))?;
        Ok(utxos.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn get_address_transactions(
        &self,
        address: &str,
    ) -> Result<Vec<AddressTransaction>, ResolverError> {
        let resp = self
            .http
            .get(self.url(&format!("/address/{address}/txs")))
            .send()
            .await
            .map_err(|e| ResolverError::Explorer(e.to_string()))?;
        let resp = check_status(resp).await?;
        let txs: Vec<EsploraTx> = resp
            .json()
            .await
            .map_err(|e| ResolverError::Explorer(e.to_string()))?;
        Ok(txs.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn get_transaction_hex(&self, txid: &str) -> Result<String, ResolverError> {
        let resp = self
            .http
            .get(self.url(&format!("/tx/{txid}/hex")))
            .send()
            .await
            .map_err(|e| ResolverError::Explorer(e.to_string()))?;
        let resp = check_status(resp).await?;
        resp.text().await.map_err(|e| ResolverError::Explorer(e.to_string()))
    }

    #[instrument(skip(self, raw_tx_hex), fields(base_url = %self.base_url))]
    async fn broadcast_tx(&self, raw_tx_hex: &str) -> Result<String, ResolverError> {
        let resp = self
            .http
            .post(self.url("/tx"))
            .body(raw_tx_hex.to_string())
            .send()
            .await
            .map_err(|e| ResolverError::Explorer(e.to_string()))?;
        if resp.status() == StatusCode::BAD_REQUEST {
            let body = resp.text().await.unwrap_or_default();
            warn!(%body, "broadcast rejected");
            return Err(ResolverError::Explorer(format!("broadcast rejected: {body}")));
        }
        let resp = check_status(resp).await?;
        resp.text().await.map_err(|e| ResolverError::Explorer(e.to_string()))
    }
}
