//! Per-beacon wallet view: UTXOs, funding, signing (SPEC_FULL §3, §9).

use std::collections::VecDeque;

use bitcoin::{PrivateKey, ScriptBuf, Txid};

/// A UTXO owned by a beacon, as tracked by its `BeaconManager`. Every
/// entry is either fetched from the explorer, donated by an observed
/// funding transaction, or the change output of a signed (possibly
/// unbroadcast) beacon signal produced by this manager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Utxo {
    pub txid: Txid,
    pub vout: u32,
    pub value: u64,
    pub script_pubkey: ScriptBuf,
}

/// Process-local wallet state for one beacon service. The UTXO list is a
/// FIFO queue (`pop_front`/`push_back`): beacon-signal construction
/// always spends the oldest known UTXO and appends its own change output
/// to the tail, so back-to-back signals consume older UTXOs first
/// (SPEC_FULL §5).
pub struct BeaconManager {
    pub script_pubkey: ScriptBuf,
    pub signing_key: PrivateKey,
    utxos: VecDeque<Utxo>,
}

impl BeaconManager {
    pub fn new(script_pubkey: ScriptBuf, signing_key: PrivateKey) -> Self {
        BeaconManager {
            script_pubkey,
            signing_key,
            utxos: VecDeque::new(),
        }
    }

    pub fn add_utxo(&mut self, utxo: Utxo) {
        self.utxos.push_back(utxo);
    }

    pub fn pop_front(&mut self) -> Option<Utxo> {
        self.utxos.pop_front()
    }

    pub fn push_back(&mut self, utxo: Utxo) {
        self.utxos.push_back(utxo);
    }

    pub fn push_front(&mut self, utxo: Utxo) {
        self.utxos.push_front(utxo);
    }

    pub fn utxo_count(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    pub fn total_value(&self) -> u64 {
        self.utxos.iter().map(|u| u.value).sum()
    }
}
