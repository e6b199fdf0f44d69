//! The `ExplorerClient`/`Keystore` collaborator interfaces (SPEC_FULL §6, §10.2).
//!
//! `btcr2-core` performs no networking of its own. The resolver and
//! DID-manager are generic over these traits; the sibling `btcr2-explorer`
//! crate supplies a real Esplora-backed implementation.

use async_trait::async_trait;
use bitcoin::PrivateKey;
use serde::{Deserialize, Serialize};

use crate::error::ResolverError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerStatus {
    pub confirmed: bool,
    pub block_height: Option<u64>,
    pub block_time: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressUtxo {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub status: ExplorerStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrevOut {
    pub scriptpubkey_address: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vin {
    pub prevout: Option<PrevOut>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressTransaction {
    pub txid: String,
    #[serde(default)]
    pub vin: Vec<Vin>,
    pub status: ExplorerStatus,
}

impl AddressTransaction {
    /// Whether this transaction spends an input whose previous output's
    /// address is `address` — the "signal belongs to this beacon" test
    /// from SPEC_FULL §4.7's "find next signals" step.
    pub fn spends_from(&self, address: &str) -> bool {
        self.vin.iter().any(|vin| {
            vin.prevout
                .as_ref()
                .and_then(|p| p.scriptpubkey_address.as_deref())
                == Some(address)
        })
    }
}

/// The four blockchain-explorer operations the core depends on
/// (SPEC_FULL §6). Backed by an Esplora-compatible REST API in the
/// default `btcr2-explorer` implementation.
#[async_trait]
pub trait ExplorerClient: Send + Sync {
    async fn get_address_utxos(&self, address: &str) -> Result<Vec<AddressUtxo>, ResolverError>;

    async fn get_address_transactions(
        &self,
        address: &str,
    ) -> Result<Vec<AddressTransaction>, ResolverError>;

    async fn get_transaction_hex(&self, txid: &str) -> Result<String, ResolverError>;

    async fn broadcast_tx(&self, raw_tx_hex: &str) -> Result<String, ResolverError>;
}

/// Used only by `DidManager::from_did` to recover a beacon's signing key
/// by the service id it is registered under.
#[async_trait]
pub trait Keystore: Send + Sync {
    async fn get_key(&self, service_id: &str) -> Option<PrivateKey>;
}
