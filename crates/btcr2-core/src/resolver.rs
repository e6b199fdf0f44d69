//! Resolution: decode, bootstrap, traverse chain, fold updates (SPEC_FULL §4.7).

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use bitcoin::consensus::deserialize;
use bitcoin::secp256k1::XOnlyPublicKey;
use bitcoin::Transaction;
use serde::{Deserialize, Serialize};

use crate::canonical;
use crate::config::{Network, NetworkParams};
use crate::document::builder;
use crate::document::model::Document;
use crate::document::placeholder;
use crate::error::{LatePublishingReason, ResolverError};
use crate::explorer::ExplorerClient;
use crate::identifier::{IdType, Identifier};
use crate::multikey::{self, KeyCodec};
use crate::update::engine::verify_secured_update;
use crate::update::payload::SecuredUpdate;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignalMetadata {
    #[serde(rename = "updatePayload")]
    pub update_payload: SecuredUpdate,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SidecarData {
    #[serde(rename = "initialDocument", skip_serializing_if = "Option::is_none")]
    pub initial_document: Option<Document>,
    #[serde(rename = "signalsMetadata", skip_serializing_if = "Option::is_none")]
    pub signals_metadata: Option<HashMap<String, SignalMetadata>>,
}

#[derive(Clone, Debug, Default)]
pub struct ResolutionOptions {
    pub version_id: Option<u64>,
    pub version_time: Option<u64>,
    pub sidecar_data: Option<SidecarData>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DidDocumentMetadata {
    pub network: String,
    pub version: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResolutionResult {
    #[serde(rename = "didDocument")]
    pub did_document: Document,
    #[serde(rename = "didResolutionMetadata")]
    pub did_resolution_metadata: serde_json::Value,
    #[serde(rename = "didDocumentMetadata")]
    pub did_document_metadata: DidDocumentMetadata,
}

/// Resolve `did` to its document as of `options` (SPEC_FULL §4.7).
pub async fn resolve(
    did: &str,
    options: ResolutionOptions,
    explorer: &dyn ExplorerClient,
    network_params: &NetworkParams,
) -> Result<ResolutionResult, ResolverError> {
    if options.version_id.is_some() && options.version_time.is_some() {
        return Err(ResolverError::InvalidResolutionOptions);
    }

    let identifier = Identifier::parse_did(did)?;
    if network_params.network != identifier.network {
        return Err(ResolverError::UnsupportedNetwork(
            identifier.network.display_name(),
        ));
    }

    let version_time_target = options.version_time.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    });

    let sidecar = options.sidecar_data.unwrap_or_default();
    let mut contemporary_document = bootstrap(&identifier, did, &sidecar)?;
    let mut contemporary_hash = contemporary_document
        .canonical_hash_base58()
        .map_err(ResolverError::Document)?;
    let mut current_version_id: u64 = 1;
    let mut update_hash_history: Vec<Vec<u8>> = Vec::new();
    let signals_metadata = sidecar.signals_metadata.unwrap_or_default();

    if options.version_id == Some(current_version_id) {
        return Ok(finish(
            contemporary_document,
            identifier.network,
            current_version_id,
        ));
    }

    let mut height: u64 = 0;
    loop {
        let beacon_addresses: Vec<(String, String)> = contemporary_document
            .beacon_services()
            .filter_map(|s| s.beacon_address().map(|a| (s.id.clone(), a.to_string())))
            .collect();
        if beacon_addresses.is_empty() {
            break;
        }

        let mut candidates: Vec<(u64, u64, String)> = Vec::new(); // (block_height, block_time, txid)
        for (_service_id, address) in &beacon_addresses {
            let txs = explorer
                .get_address_transactions(address)
                .await
                .map_err(|_| ResolverError::Explorer(format!("fetching transactions for {address}")))?;
            for tx in txs {
                if !tx.status.confirmed || !tx.spends_from(address) {
                    continue;
                }
                let Some(block_height) = tx.status.block_height else { continue };
                let Some(block_time) = tx.status.block_time else { continue };
                if block_height < height {
                    continue;
                }
                candidates.push((block_height, block_time, tx.txid));
            }
        }

        if candidates.is_empty() {
            break;
        }
        candidates.sort_by_key(|(h, _, _)| *h);
        let earliest_height = candidates[0].0;
        let signals_at_earliest: Vec<(u64, u64, String)> = candidates
            .into_iter()
            .filter(|(h, _, _)| *h == earliest_height)
            .collect();

        if signals_at_earliest[0].1 > version_time_target {
            break;
        }

        let mut emitted: Vec<SecuredUpdate> = Vec::new();
        for (_h, _t, txid) in &signals_at_earliest {
            let tx_hex = explorer
                .get_transaction_hex(txid)
                .await
                .map_err(|_| ResolverError::Explorer(format!("fetching tx hex for {txid}")))?;
            let tx_bytes = hex::decode(&tx_hex)
                .map_err(|e| ResolverError::Explorer(format!("invalid tx hex: {e}")))?;
            let tx: Transaction = deserialize(&tx_bytes)
                .map_err(|e| ResolverError::Explorer(format!("invalid tx bytes: {e}")))?;

            let Some(last_output) = tx.output.last() else { continue };
            if !last_output.script_pubkey.is_op_return() {
                continue;
            }
            let commitment = extract_op_return_commitment(&last_output.script_pubkey)
                .ok_or(ResolverError::InvalidSidecarData)?;

            let Some(meta) = signals_metadata.get(txid) else {
                return Err(ResolverError::NotImplemented(
                    "CAS retrieval of update payloads",
                ));
            };
            let computed = canonical::canonical_hash(&meta.update_payload).map_err(ResolverError::Document)?;
            if computed != commitment {
                return Err(ResolverError::InvalidSidecarData);
            }
            emitted.push(meta.update_payload.clone());
        }

        emitted.sort_by_key(|u| u.payload.target_version_id);
        for update in emitted {
            let target_version_id = update.payload.target_version_id;
            if target_version_id <= current_version_id {
                if target_version_id < 2 {
                    continue;
                }
                let expected = update_hash_history
                    .get(target_version_id as usize - 2)
                    .cloned()
                    .unwrap_or_default();
                let found = canonical::canonical_hash(&update).map_err(ResolverError::Document)?;
                if found.to_vec() != expected {
                    return Err(LatePublishingReason::DuplicateHashMismatch {
                        version: target_version_id,
                        expected: canonical::base58_encode(&expected),
                        found: canonical::base58_encode(&found),
                    }
                    .into());
                }
                continue;
            }

            if target_version_id != current_version_id + 1 {
                return Err(LatePublishingReason::VersionSkip {
                    current: current_version_id,
                    found: target_version_id,
                }
                .into());
            }

            if update.payload.source_hash != contemporary_hash {
                return Err(LatePublishingReason::SourceHashMismatch {
                    expected: contemporary_hash.clone(),
                    found: update.payload.source_hash.clone(),
                }
                .into());
            }

            let vm = contemporary_document
                .find_verification_method(&update.proof.verification_method)
                .ok_or_else(|| {
                    ResolverError::Document(crate::error::DocumentError::VerificationMethodNotFound(
                        update.proof.verification_method.clone(),
                    ))
                })?;
            let pubkey = xonly_from_multibase(&vm.public_key_multibase)?;
            if !verify_secured_update(&update, &pubkey) {
                return Err(crate::error::UpdateError::InvalidProof.into());
            }

            let mut value = serde_json::to_value(&contemporary_document).map_err(crate::error::DocumentError::from)?;
            json_patch::patch(&mut value, &json_patch::Patch(update.payload.patch.clone()))
                .map_err(|_| ResolverError::InvalidSidecarData)?;
            let new_doc: Document =
                serde_json::from_value(value).map_err(crate::error::DocumentError::from)?;
            let new_hash = new_doc.canonical_hash_base58().map_err(ResolverError::Document)?;
            if new_hash != update.payload.target_hash {
                return Err(LatePublishingReason::TargetHashMismatch {
                    expected: update.payload.target_hash.clone(),
                    found: new_hash,
                }
                .into());
            }

            let update_hash = canonical::canonical_hash(&update).map_err(ResolverError::Document)?;
            update_hash_history.push(update_hash.to_vec());
            contemporary_document = new_doc;
            contemporary_hash = new_hash;
            current_version_id = target_version_id;

            if options.version_id == Some(current_version_id) {
                return Ok(finish(contemporary_document, identifier.network, current_version_id));
            }
        }

        height = earliest_height + 1;
    }

    Ok(finish(contemporary_document, identifier.network, current_version_id))
}

fn bootstrap(identifier: &Identifier, did: &str, sidecar: &SidecarData) -> Result<Document, ResolverError> {
    match identifier.id_type {
        IdType::Key => {
            let (computed_did, doc) =
                builder::from_key_genesis_bytes(&identifier.genesis_bytes, identifier.network, identifier.version)
                    .map_err(ResolverError::Document)?;
            if computed_did != did {
                return Err(ResolverError::InvalidDid {
                    input: did.to_string(),
                    computed: computed_did,
                });
            }
            Ok(doc)
        }
        IdType::External => match &sidecar.initial_document {
            Some(initial_document) => {
                let intermediate = placeholder::unbind(initial_document);
                let hash = canonical::canonical_hash(&intermediate).map_err(ResolverError::Document)?;
                if hash.as_slice() != identifier.genesis_bytes.as_slice() {
                    return Err(ResolverError::InvalidDid {
                        input: did.to_string(),
                        computed: canonical::base58_encode(&hash),
                    });
                }
                Ok(initial_document.clone())
            }
            None => Err(ResolverError::NotImplemented(
                "CAS retrieval of initial documents",
            )),
        },
    }
}

fn finish(document: Document, network: Network, version: u64) -> ResolutionResult {
    ResolutionResult {
        did_document: document,
        did_resolution_metadata: serde_json::json!({}),
        did_document_metadata: DidDocumentMetadata {
            network: network.display_name(),
            version,
        },
    }
}

fn extract_op_return_commitment(script: &bitcoin::ScriptBuf) -> Option<[u8; 32]> {
    use bitcoin::opcodes::all::OP_RETURN;
    use bitcoin::script::Instruction;

    let mut instructions = script.instructions();
    match instructions.next()?.ok()? {
        Instruction::Op(op) if op == OP_RETURN => {}
        _ => return None,
    }
    let bytes = match instructions.next()?.ok()? {
        Instruction::PushBytes(bytes) => bytes,
        _ => return None,
    };
    if bytes.len() != 32 {
        return None;
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(bytes.as_bytes());
    Some(out)
}

/// Parse the Schnorr-verifiable x-only key out of a verification method's
/// multibase value. A failure here means the same thing a failed
/// signature check means: the update's proof cannot be trusted.
fn xonly_from_multibase(multibase: &str) -> Result<XOnlyPublicKey, ResolverError> {
    let (codec, bytes) =
        multikey::decode_multikey(multibase).map_err(|_| crate::error::UpdateError::InvalidProof)?;
    match codec {
        KeyCodec::Secp256k1Pub => {
            let full = bitcoin::secp256k1::PublicKey::from_slice(&bytes)
                .map_err(|_| crate::error::UpdateError::InvalidProof)?;
            Ok(XOnlyPublicKey::from(full))
        }
        KeyCodec::Bip340Pub => {
            XOnlyPublicKey::from_slice(&bytes).map_err(|_| crate::error::UpdateError::InvalidProof.into())
        }
        KeyCodec::Bip340Priv => Err(crate::error::UpdateError::InvalidProof.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::signal::build_beacon_signal;
    use crate::beacon::{BeaconManager, Utxo};
    use crate::document::builder::from_secp256k1_key;
    use crate::explorer::{AddressTransaction, AddressUtxo, ExplorerStatus, PrevOut, Vin};
    use crate::update::engine::Updater;
    use async_trait::async_trait;
    use bitcoin::hashes::Hash;
    use bitcoin::secp256k1::Secp256k1;
    use bitcoin::{Address, PrivateKey, Txid};
    use std::str::FromStr;
    use std::sync::Mutex;

    struct FakeExplorer {
        txs_by_address: HashMap<String, Vec<AddressTransaction>>,
        hex_by_txid: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl ExplorerClient for FakeExplorer {
        async fn get_address_utxos(&self, _address: &str) -> Result<Vec<AddressUtxo>, ResolverError> {
            Ok(Vec::new())
        }

        async fn get_address_transactions(
            &self,
            address: &str,
        ) -> Result<Vec<AddressTransaction>, ResolverError> {
            Ok(self.txs_by_address.get(address).cloned().unwrap_or_default())
        }

        async fn get_transaction_hex(&self, txid: &str) -> Result<String, ResolverError> {
            self.hex_by_txid
                .lock()
                .unwrap()
                .get(txid)
                .cloned()
                .ok_or_else(|| ResolverError::Explorer("no such tx".to_string()))
        }

        async fn broadcast_tx(&self, _raw_tx_hex: &str) -> Result<String, ResolverError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn resolve_applies_a_single_update_fed_via_sidecar() {
        let wif = "KyZpNDKnfs94vbrwhJneDi77V6jF64PWPF8x5cdJb8ifgg2DUc9d";
        let privkey = PrivateKey::from_str(wif).unwrap();
        let secp = Secp256k1::new();
        let pubkey = privkey.public_key(&secp).inner;
        let (did, initial_doc) = from_secp256k1_key(&pubkey, Network::Bitcoin, 1).unwrap();
        let vm_id = initial_doc.verification_method[0].id.clone();

        let mut updater = Updater::new(initial_doc.clone());
        updater.add_service(crate::document::model::Service {
            id: format!("{did}#beacon-2"),
            type_: "SingletonBeacon".to_string(),
            service_endpoint: "bitcoin:bc1qexample".to_string(),
        });
        let payload = updater.construct_update_payload(2).unwrap();
        let secured = updater
            .finalize_update_payload(payload, &did, vm_id, &privkey)
            .unwrap();

        let commitment = canonical::canonical_hash(&secured).unwrap();
        let beacon_address = initial_doc
            .beacon_services()
            .next()
            .and_then(|s| s.beacon_address())
            .unwrap()
            .to_string();
        let beacon_script = Address::from_str(&beacon_address)
            .unwrap()
            .assume_checked()
            .script_pubkey();
        let mut manager = BeaconManager::new(beacon_script, privkey);
        manager.add_utxo(Utxo {
            txid: Txid::all_zeros(),
            vout: 0,
            value: 50_000,
            script_pubkey: manager.script_pubkey.clone(),
        });
        let signal_tx = build_beacon_signal(&mut manager, commitment, 4000).unwrap();
        let txid = signal_tx.compute_txid().to_string();

        let mut txs_by_address = HashMap::new();
        txs_by_address.insert(
            beacon_address.clone(),
            vec![AddressTransaction {
                txid: txid.clone(),
                vin: vec![Vin {
                    prevout: Some(PrevOut {
                        scriptpubkey_address: Some(beacon_address.clone()),
                    }),
                }],
                status: ExplorerStatus {
                    confirmed: true,
                    block_height: Some(10),
                    block_time: Some(1_700_000_000),
                },
            }],
        );
        let mut hex_by_txid = HashMap::new();
        hex_by_txid.insert(txid.clone(), hex::encode(bitcoin::consensus::serialize(&signal_tx)));

        let explorer = FakeExplorer {
            txs_by_address,
            hex_by_txid: Mutex::new(hex_by_txid),
        };

        let mut signals_metadata = HashMap::new();
        signals_metadata.insert(txid, SignalMetadata { update_payload: secured });
        let sidecar = SidecarData {
            initial_document: None,
            signals_metadata: Some(signals_metadata),
        };
        let options = ResolutionOptions {
            version_id: None,
            version_time: Some(2_000_000_000),
            sidecar_data: Some(sidecar),
        };

        let result = resolve(&did, options, &explorer, &NetworkParams::BITCOIN)
            .await
            .unwrap();
        assert_eq!(result.did_document_metadata.version, 2);
        assert_eq!(result.did_document.service.len(), 4);
    }

    #[tokio::test]
    async fn both_version_id_and_version_time_is_rejected() {
        let explorer = FakeExplorer {
            txs_by_address: HashMap::new(),
            hex_by_txid: Mutex::new(HashMap::new()),
        };
        let options = ResolutionOptions {
            version_id: Some(1),
            version_time: Some(1),
            sidecar_data: None,
        };
        let err = resolve(
            "did:btcr2:k1qqpnp4206rw5yznwt7xnvf847dyzet34pauatur4806mamuu9kg670qvqx7vy",
            options,
            &explorer,
            &NetworkParams::BITCOIN,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ResolverError::InvalidResolutionOptions));
    }
}
