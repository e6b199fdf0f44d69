//! The owning side of a `did:btcr2` identifier: create, update, announce,
//! persist (SPEC_FULL §3, §4.6).

use std::collections::HashMap;
use std::str::FromStr;

use bitcoin::secp256k1::Secp256k1;
use bitcoin::{Address, PrivateKey};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::beacon::signal::build_beacon_signal;
use crate::beacon::{BeaconManager, Utxo};
use crate::canonical;
use crate::config::{Network, NetworkParams, DEFAULT_TX_FEE};
use crate::document::builder;
use crate::document::model::Document;
use crate::document::placeholder;
use crate::error::{BeaconError, Btcr2Error, ResolverError};
use crate::explorer::{ExplorerClient, Keystore};
use crate::identifier::{IdType, Identifier};
use crate::resolver::SignalMetadata;
use crate::update::engine::Updater;
use crate::update::payload::{SecuredUpdate, UpdatePayload};

/// The sidecar bundle a DID controller publishes out-of-band so resolvers
/// don't need a CAS lookup (SPEC_FULL §6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SidecarPayload {
    pub did: String,
    #[serde(rename = "initialDocument", skip_serializing_if = "Option::is_none")]
    pub initial_document: Option<Document>,
    #[serde(rename = "signalsMetadata", skip_serializing_if = "Option::is_none")]
    pub signals_metadata: Option<HashMap<String, SignalMetadata>>,
}

/// The full persisted DID-manager state (SPEC_FULL §6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistedState {
    pub did: String,
    pub document: Document,
    pub version: u64,
    #[serde(rename = "sidecarData")]
    pub sidecar_data: SidecarPayload,
}

/// Owns one `did:btcr2` identifier's full lifecycle: creation, update
/// construction and announcement, and sidecar persistence.
pub struct DidManager {
    did: String,
    id_type: IdType,
    initial_document: Document,
    document: Document,
    version: u64,
    signals_metadata: HashMap<String, SignalMetadata>,
    beacon_managers: HashMap<String, BeaconManager>,
}

impl DidManager {
    /// KEY-type creation: the DID is derivable from `signing_key` alone,
    /// no on-chain anchor required. Registers one `BeaconManager` per
    /// initial beacon, matched by fragment to the address it was derived
    /// for.
    #[instrument(skip(signing_key))]
    pub fn create_deterministic(signing_key: &PrivateKey, network: Network) -> Result<DidManager, Btcr2Error> {
        let secp = Secp256k1::new();
        let pubkey = signing_key.public_key(&secp).inner;
        let (did, document) = builder::from_secp256k1_key(&pubkey, network, 1)?;

        let mut beacon_managers = HashMap::new();
        for service in document.beacon_services() {
            let Some(address) = service.beacon_address() else { continue };
            let script_pubkey = Address::from_str(address)
                .map_err(|e| BeaconError::AddressDerivation(e.to_string()))?
                .require_network(network.bitcoin_network())
                .map_err(|e| BeaconError::AddressDerivation(e.to_string()))?
                .script_pubkey();
            beacon_managers.insert(
                service.id.clone(),
                BeaconManager::new(script_pubkey, signing_key.clone()),
            );
        }

        info!(did = %did, "created deterministic did:btcr2 identifier");
        Ok(DidManager {
            did,
            id_type: IdType::Key,
            initial_document: document.clone(),
            document,
            version: 1,
            signals_metadata: HashMap::new(),
            beacon_managers,
        })
    }

    /// EXTERNAL-type creation: `genesis_bytes` is the canonical hash of
    /// `intermediate`, which must be rooted at the placeholder DID. No
    /// default signing key is associated with externally-supplied
    /// beacons — register beacon managers separately via
    /// [`DidManager::register_beacon`].
    #[instrument(skip(intermediate))]
    pub fn create_external(intermediate: Document, network: Network, version: u32) -> Result<DidManager, Btcr2Error> {
        let genesis = builder::external_genesis_bytes(&intermediate)?;
        let identifier = Identifier::new_external(version, network, genesis.to_vec())?;
        let did = identifier.to_did()?;
        let document = placeholder::bind(&intermediate, &did);

        info!(did = %did, "created external did:btcr2 identifier");
        Ok(DidManager {
            did,
            id_type: IdType::External,
            initial_document: document.clone(),
            document,
            version: 1,
            signals_metadata: HashMap::new(),
            beacon_managers: HashMap::new(),
        })
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Register (or replace) the signing wallet for a beacon service id.
    pub fn register_beacon(&mut self, service_id: String, manager: BeaconManager) {
        self.beacon_managers.insert(service_id, manager);
    }

    /// An `Updater` rooted at a clone of the current document.
    pub fn updater(&self) -> Updater {
        Updater::new(self.document.clone())
    }

    /// Sign `payload` under `verification_method`, then announce it
    /// through `beacon_id` (SPEC_FULL §4.6).
    #[instrument(skip(self, updater, payload, signing_key, explorer))]
    pub async fn finalize_update_payload(
        &mut self,
        updater: &Updater,
        payload: UpdatePayload,
        verification_method: String,
        signing_key: &PrivateKey,
        beacon_id: &str,
        explorer: &dyn ExplorerClient,
    ) -> Result<String, Btcr2Error> {
        let secured = updater.finalize_update_payload(payload, &self.did, verification_method, signing_key)?;
        self.document = updater.target().clone();
        self.version += 1;
        self.announce_update(beacon_id, secured, explorer).await
    }

    /// Build and broadcast the beacon signal committing to `secured_update`,
    /// then persist its metadata so a resolver fed this manager's sidecar
    /// data can verify the signal without a CAS lookup.
    #[instrument(skip(self, secured_update, explorer))]
    pub async fn announce_update(
        &mut self,
        beacon_id: &str,
        secured_update: SecuredUpdate,
        explorer: &dyn ExplorerClient,
    ) -> Result<String, Btcr2Error> {
        let commitment = canonical::canonical_hash(&secured_update)?;
        let manager = self
            .beacon_managers
            .get_mut(beacon_id)
            .ok_or_else(|| BeaconError::AddressDerivation(format!("no beacon manager for {beacon_id}")))?;
        let tx = build_beacon_signal(manager, commitment, DEFAULT_TX_FEE)?;
        let raw_hex = hex::encode(bitcoin::consensus::serialize(&tx));
        let txid = explorer.broadcast_tx(&raw_hex).await?;

        info!(did = %self.did, beacon_id, txid = %txid, "announced update");
        self.signals_metadata
            .insert(txid.clone(), SignalMetadata { update_payload: secured_update });
        Ok(txid)
    }

    /// Donate a known UTXO to a beacon's manager (e.g. observed from an
    /// external funding transaction).
    pub fn fund_beacon(&mut self, beacon_id: &str, utxo: Utxo) -> Result<(), Btcr2Error> {
        let manager = self
            .beacon_managers
            .get_mut(beacon_id)
            .ok_or_else(|| BeaconError::AddressDerivation(format!("no beacon manager for {beacon_id}")))?;
        manager.add_utxo(utxo);
        Ok(())
    }

    /// `{ did, initialDocument? (EXTERNAL only), signalsMetadata? }`.
    pub fn get_sidecar_data(&self) -> SidecarPayload {
        SidecarPayload {
            did: self.did.clone(),
            initial_document: matches!(self.id_type, IdType::External).then(|| self.initial_document.clone()),
            signals_metadata: (!self.signals_metadata.is_empty()).then(|| self.signals_metadata.clone()),
        }
    }

    pub fn to_persisted_state(&self) -> PersistedState {
        PersistedState {
            did: self.did.clone(),
            document: self.document.clone(),
            version: self.version,
            sidecar_data: self.get_sidecar_data(),
        }
    }

    /// Rehydrate a manager from its persisted state, recovering one
    /// `BeaconManager` per beacon service whose signing key `keystore`
    /// can supply.
    #[instrument(skip(serialized, network_params, keystore))]
    pub async fn from_did(
        serialized: &str,
        network_params: &NetworkParams,
        keystore: &dyn Keystore,
    ) -> Result<DidManager, Btcr2Error> {
        let state: PersistedState =
            serde_json::from_str(serialized).map_err(|e| crate::error::DocumentError::Json(e))?;
        let identifier = Identifier::parse_did(&state.did)?;
        if identifier.network != network_params.network {
            return Err(ResolverError::UnsupportedNetwork(identifier.network.display_name()).into());
        }

        let initial_document = match identifier.id_type {
            IdType::Key => {
                let (computed_did, doc) =
                    builder::from_key_genesis_bytes(&identifier.genesis_bytes, identifier.network, identifier.version)?;
                if computed_did != state.did {
                    return Err(ResolverError::InvalidDid {
                        input: state.did.clone(),
                        computed: computed_did,
                    }
                    .into());
                }
                doc
            }
            IdType::External => state
                .sidecar_data
                .initial_document
                .clone()
                .ok_or(ResolverError::InvalidSidecarData)?,
        };

        let mut beacon_managers = HashMap::new();
        for service in state.document.beacon_services() {
            let Some(address) = service.beacon_address() else { continue };
            let Some(signing_key) = keystore.get_key(&service.id).await else { continue };
            let script_pubkey = Address::from_str(address)
                .map_err(|e| BeaconError::AddressDerivation(e.to_string()))?
                .require_network(network_params.network.bitcoin_network())
                .map_err(|e| BeaconError::AddressDerivation(e.to_string()))?
                .script_pubkey();
            beacon_managers.insert(service.id.clone(), BeaconManager::new(script_pubkey, signing_key));
        }

        Ok(DidManager {
            did: state.did,
            id_type: identifier.id_type,
            initial_document,
            document: state.document,
            version: state.version,
            signals_metadata: state.sidecar_data.signals_metadata.unwrap_or_default(),
            beacon_managers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::{AddressTransaction, AddressUtxo};
    use async_trait::async_trait;
    use bitcoin::hashes::Hash;
    use bitcoin::Txid;
    use std::sync::Mutex;

    struct NullExplorer {
        last_broadcast: Mutex<Option<String>>,
    }

    #[async_trait]
    impl ExplorerClient for NullExplorer {
        async fn get_address_utxos(&self, _address: &str) -> Result<Vec<AddressUtxo>, ResolverError> {
            Ok(Vec::new())
        }
        async fn get_address_transactions(&self, _address: &str) -> Result<Vec<AddressTransaction>, ResolverError> {
            Ok(Vec::new())
        }
        async fn get_transaction_hex(&self, _txid: &str) -> Result<String, ResolverError> {
            Err(ResolverError::Explorer("not used".to_string()))
        }
        async fn broadcast_tx(&self, raw_tx_hex: &str) -> Result<String, ResolverError> {
            *self.last_broadcast.lock().unwrap() = Some(raw_tx_hex.to_string());
            Ok("deadbeef".repeat(8))
        }
    }

    struct StaticKeystore(PrivateKey);

    #[async_trait]
    impl Keystore for StaticKeystore {
        async fn get_key(&self, _service_id: &str) -> Option<PrivateKey> {
            Some(self.0)
        }
    }

    fn sample_key() -> PrivateKey {
        PrivateKey::from_slice(&[11u8; 32], bitcoin::NetworkKind::Main).unwrap()
    }

    #[test]
    fn create_deterministic_registers_one_beacon_manager_per_service() {
        let key = sample_key();
        let manager = DidManager::create_deterministic(&key, Network::Bitcoin).unwrap();
        assert_eq!(manager.beacon_managers.len(), 3);
        assert_eq!(manager.version(), 1);
    }

    #[tokio::test]
    async fn announce_update_persists_signal_metadata_and_broadcasts() {
        let key = sample_key();
        let mut manager = DidManager::create_deterministic(&key, Network::Bitcoin).unwrap();
        let beacon_id = manager
            .document
            .beacon_services()
            .next()
            .unwrap()
            .id
            .clone();
        let wallet = manager.beacon_managers.get_mut(&beacon_id).unwrap();
        wallet.add_utxo(Utxo {
            txid: Txid::all_zeros(),
            vout: 0,
            value: 50_000,
            script_pubkey: wallet.script_pubkey.clone(),
        });

        let vm_id = manager.document.verification_method[0].id.clone();
        let updater = manager.updater();
        let payload = updater.construct_update_payload(2).unwrap();
        let explorer = NullExplorer {
            last_broadcast: Mutex::new(None),
        };
        let txid = manager
            .finalize_update_payload(&updater, payload, vm_id, &key, &beacon_id, &explorer)
            .await
            .unwrap();

        assert!(manager.signals_metadata.contains_key(&txid));
        assert!(explorer.last_broadcast.lock().unwrap().is_some());
        assert_eq!(manager.version(), 2);
    }

    #[tokio::test]
    async fn from_did_round_trips_persisted_state() {
        let key = sample_key();
        let manager = DidManager::create_deterministic(&key, Network::Bitcoin).unwrap();
        let persisted = serde_json::to_string(&manager.to_persisted_state()).unwrap();

        let keystore = StaticKeystore(key);
        let rehydrated = DidManager::from_did(&persisted, &NetworkParams::BITCOIN, &keystore)
            .await
            .unwrap();
        assert_eq!(rehydrated.did(), manager.did());
        assert_eq!(rehydrated.beacon_managers.len(), 3);
    }
}
