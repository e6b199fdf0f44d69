//! One `EsploraClient` per configured network (SPEC_FULL §10.2).
//!
//! `ExplorerPool` is a thin registry: it owns one HTTP client per network
//! the embedder has configured, and dispatches `ExplorerClient` calls to
//! whichever client matches the requested network. This mirrors the way a
//! resolver or DID manager is parameterized by a single `Network` at a
//! time, while the workspace as a whole may need to talk to several chains
//! (e.g. `bitcoin` for production DIDs, `signet` for a staging fleet).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use btcr2_core::config::{Network, NetworkParams};
use btcr2_core::error::ResolverError;
use btcr2_core::explorer::{AddressTransaction, AddressUtxo, ExplorerClient};

use crate::client::EsploraClient;

/// A registry of `EsploraClient`s keyed by network, built from a set of
/// `NetworkParams`. Networks with no `explorer_base_url` (regtest, or an
/// embedder-supplied user-defined network that didn't fill one in) are
/// simply absent — calling through the pool for them fails with
/// `UnsupportedNetwork`.
pub struct ExplorerPool {
    clients: HashMap<Network, EsploraClient>,
}

impl ExplorerPool {
    pub fn new() -> Self {
        ExplorerPool {
            clients: HashMap::new(),
        }
    }

    /// Register a client for `params.network`, built against
    /// `params.explorer_base_url` if present. No-op if the params carry no
    /// URL for this network.
    pub fn with_network(mut self, params: NetworkParams, timeout: Duration) -> Self {
        if let Some(base_url) = params.explorer_base_url {
            self.clients
                .insert(params.network, EsploraClient::with_timeout(base_url, timeout));
        }
        self
    }

    /// Build a pool covering every named network with a default explorer
    /// URL (`NetworkParams::defaults_for`), using the default per-client
    /// timeout.
    pub fn with_defaults() -> Self {
        let mut pool = ExplorerPool::new();
        for network in Network::NAMED {
            if let Some(params) = NetworkParams::defaults_for(network) {
                pool = pool.with_network(params, Duration::from_secs(10));
            }
        }
        pool
    }

    fn client_for(&self, network: Network) -> Result<&EsploraClient, ResolverError> {
        self.clients
            .get(&network)
            .ok_or_else(|| ResolverError::UnsupportedNetwork(network.display_name()))
    }
}

impl Default for ExplorerPool {
    fn default() -> Self {
        ExplorerPool::new()
    }
}

/// A pool scoped to one network — what the resolver and `DidManager`
/// actually take, since both operate against a single network at a time.
pub struct ScopedExplorer<'a> {
    pool: &'a ExplorerPool,
    network: Network,
}

impl<'a> ScopedExplorer<'a> {
    pub fn new(pool: &'a ExplorerPool, network: Network) -> Self {
        ScopedExplorer { pool, network }
    }
}

#[async_trait]
impl<'a> ExplorerClient for ScopedExplorer<'a> {
    async fn get_address_utxos(&self, address: &str) -> Result<Vec<AddressUtxo>, ResolverError> {
        self.pool.client_for(self.network)?.get_address_utxos(address).await
    }

    async fn get_address_transactions(
        &self,
        address: &str,
    ) -> Result<Vec<AddressTransaction>, ResolverError> {
        self.pool
            .client_for(self.network)?
            .get_address_transactions(address)
            .await
    }

    async fn get_transaction_hex(&self, txid: &str) -> Result<String, ResolverError> {
        self.pool.client_for(self.network)?.get_transaction_hex(txid).await
    }

    async fn broadcast_tx(&self, raw_tx_hex: &str) -> Result<String, ResolverError> {
        self.pool.client_for(self.network)?.broadcast_tx(raw_tx_hex).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_with_defaults_covers_every_named_network_with_a_url() {
        let pool = ExplorerPool::with_defaults();
        for network in Network::NAMED {
            let has_url = NetworkParams::defaults_for(network)
                .and_then(|p| p.explorer_base_url)
                .is_some();
            assert_eq!(pool.clients.contains_key(&network), has_url);
        }
    }

    #[tokio::test]
    async fn unregistered_network_reports_unsupported() {
        let pool = ExplorerPool::new();
        let scoped = ScopedExplorer::new(&pool, Network::Regtest);
        let err = scoped.get_address_utxos("bcrt1qexample").await.unwrap_err();
        assert!(matches!(err, ResolverError::UnsupportedNetwork(_)));
    }
}
