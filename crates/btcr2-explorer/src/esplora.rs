//! Esplora REST API JSON format adapter.
//!
//! The Esplora API uses a different shape than the plain-data types
//! `btcr2-core::explorer` declares: confirmation status is a nested object,
//! inputs carry their previous output inline, and UTXO/transaction
//! listings share a `status` sub-object. This module defines serde types
//! matching the wire format and converts them to the core crate's types.

use btcr2_core::explorer::{AddressTransaction, AddressUtxo, ExplorerStatus, PrevOut, Vin};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct EsploraStatus {
    pub confirmed: bool,
    pub block_height: Option<u64>,
    pub block_time: Option<u64>,
}

impl From<EsploraStatus> for ExplorerStatus {
    fn from(s: EsploraStatus) -> Self {
        ExplorerStatus {
            confirmed: s.confirmed,
            block_height: s.block_height,
            block_time: s.block_time,
        }
    }
}

#[derive(Deserialize)]
pub struct EsploraPrevOut {
    pub scriptpubkey_address: Option<String>,
}

impl From<EsploraPrevOut> for PrevOut {
    fn from(p: EsploraPrevOut) -> Self {
        PrevOut {
            scriptpubkey_address: p.scriptpubkey_address,
        }
    }
}

#[derive(Deserialize)]
pub struct EsploraVin {
    pub prevout: Option<EsploraPrevOut>,
}

impl From<EsploraVin> for Vin {
    fn from(v: EsploraVin) -> Self {
        Vin {
            prevout: v.prevout.map(Into::into),
        }
    }
}

#[derive(Deserialize)]
pub struct EsploraUtxo {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub status: EsploraStatus,
}

impl From<EsploraUtxo> for AddressUtxo {
    fn from(u: EsploraUtxo) -> Self {
        AddressUtxo {
            txid: u.txid,
            vout: u.vout,
            value: u.value,
            status: u.status.into(),
        }
    }
}

#[derive(Deserialize)]
pub struct EsploraTx {
    pub txid: String,
    #[serde(default)]
    pub vin: Vec<EsploraVin>,
    pub status: EsploraStatus,
}

impl From<EsploraTx> for AddressTransaction {
    fn from(t: EsploraTx) -> Self {
        AddressTransaction {
            txid: t.txid,
            vin: t.vin.into_iter().map(Into::into).collect(),
            status: t.status.into(),
        }
    }
}
