//! Update construction and verification (SPEC_FULL §4.5).

use bitcoin::secp256k1::{Keypair, Message, Secp256k1};
use json_patch::{AddOperation, PatchOperation};
use serde_json::Value;

use crate::canonical;
use crate::document::model::{Document, Service, VerificationMethod};
use crate::error::{DocumentError, UpdateError};
use crate::update::payload::{zcap_root_capability, DataIntegrityProof, SecuredUpdate, UpdatePayload};

/// Accumulates a JSON-Patch against a source document, then produces and
/// signs the secured update payload that announces it on-chain.
///
/// The source document is never mutated in place — `target` starts as a
/// clone and every `add_*` call appends both the field itself and the
/// matching patch operation, so `target` and the accumulated patch always
/// agree.
pub struct Updater {
    source: Document,
    target: Document,
    patch: Vec<PatchOperation>,
}

/// An `add` operation appending `array`'s just-pushed last element at
/// `array_path`. `array`'s own field is skipped from serialization while
/// empty, so a numeric-index or `-` append against the path is only valid
/// once the array already exists in the source JSON; when `was_empty`
/// (the state before the push this call follows), the whole array is
/// added in its place instead.
fn array_append_op<T: serde::Serialize>(array_path: &str, was_empty: bool, array: &[T]) -> PatchOperation {
    if was_empty {
        PatchOperation::Add(AddOperation {
            path: array_path.to_string(),
            value: serde_json::to_value(array).expect("array always serializes"),
        })
    } else {
        let last = array.last().expect("caller just pushed an element");
        PatchOperation::Add(AddOperation {
            path: format!("{array_path}/-"),
            value: serde_json::to_value(last).expect("element always serializes"),
        })
    }
}

impl Updater {
    pub fn new(source: Document) -> Self {
        let target = source.clone();
        Updater {
            source,
            target,
            patch: Vec::new(),
        }
    }

    pub fn target(&self) -> &Document {
        &self.target
    }

    /// Append a verification method and reference it from `relationships`.
    /// Returns the new method's `id`. `verificationMethod` is omitted from
    /// the serialized document while empty (`skip_serializing_if`), so the
    /// first entry ever added replaces the whole (absent) array rather
    /// than indexing into it; later entries append with `-` (SPEC_FULL
    /// §9).
    pub fn add_verification_method(&mut self, vm: VerificationMethod) -> String {
        let was_empty = self.target.verification_method.is_empty();
        self.target.verification_method.push(vm.clone());
        self.patch
            .push(array_append_op("/verificationMethod", was_empty, &self.target.verification_method));
        vm.id
    }

    pub fn add_service(&mut self, service: Service) -> String {
        let was_empty = self.target.service.is_empty();
        self.target.service.push(service.clone());
        self.patch
            .push(array_append_op("/service", was_empty, &self.target.service));
        service.id
    }

    /// Apply the accumulated patch to a freshly-serialized copy of the
    /// source document and confirm it reproduces `target` byte-for-byte
    /// under JCS. Catches any drift between the field mutations made on
    /// `target` and the patch operations recorded alongside them.
    pub fn validate_update(&self) -> Result<(), UpdateError> {
        let mut applied: Value =
            serde_json::to_value(&self.source).map_err(DocumentError::Json)?;
        json_patch::patch(&mut applied, &json_patch::Patch(self.patch.clone()))
            .map_err(|e| UpdateError::PatchMismatch {
                expected: "<patch application>".to_string(),
                computed: e.to_string(),
            })?;
        let computed = canonical::jcs_bytes(&applied).map_err(UpdateError::Document)?;
        let expected = canonical::jcs_bytes(&self.target).map_err(UpdateError::Document)?;
        if computed != expected {
            return Err(UpdateError::PatchMismatch {
                expected: canonical::base58_encode(&canonical::sha256(&expected)),
                computed: canonical::base58_encode(&canonical::sha256(&computed)),
            });
        }
        Ok(())
    }

    /// Build the unsigned update payload. `target_version_id` is the
    /// version number the target document will carry once this update is
    /// folded into history.
    pub fn construct_update_payload(&self, target_version_id: u64) -> Result<UpdatePayload, UpdateError> {
        self.validate_update()?;
        let source_hash = self.source.canonical_hash_base58().map_err(UpdateError::Document)?;
        let target_hash = self.target.canonical_hash_base58().map_err(UpdateError::Document)?;
        Ok(UpdatePayload::new(
            self.patch.clone(),
            source_hash,
            target_hash,
            target_version_id,
        ))
    }

    /// Sign `payload` with `signing_key` under `verification_method`,
    /// producing a complete secured update. The signing input is
    /// `SHA-256(JCS(payload)) || SHA-256(JCS(proof-options))`, where
    /// proof-options is the proof object with `proofValue` omitted
    /// (SPEC_FULL §4.5.4). The result is self-verified before returning.
    pub fn finalize_update_payload(
        &self,
        payload: UpdatePayload,
        did: &str,
        verification_method: String,
        signing_key: &bitcoin::PrivateKey,
    ) -> Result<SecuredUpdate, UpdateError> {
        let proof_options = DataIntegrityProof {
            type_: "DataIntegrityProof".to_string(),
            cryptosuite: crate::update::payload::CRYPTOSUITE.to_string(),
            verification_method,
            proof_purpose: "capabilityInvocation".to_string(),
            capability: zcap_root_capability(did),
            capability_action: "Write".to_string(),
            proof_value: String::new(),
        };

        let signing_input = signing_bytes(&payload, &proof_options).map_err(UpdateError::Document)?;
        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(&secp, &signing_key.inner);
        let msg = Message::from_digest(signing_input);
        let signature = secp.sign_schnorr(&msg, &keypair);

        let proof = DataIntegrityProof {
            proof_value: hex::encode(signature.as_ref()),
            ..proof_options
        };

        let secured = SecuredUpdate { payload, proof };
        verify_secured_update(&secured, &keypair.x_only_public_key().0)
            .then_some(())
            .ok_or(UpdateError::InvalidProof)?;
        Ok(secured)
    }
}

/// `SHA-256(JCS(payload)) || SHA-256(JCS(proof-without-proofValue))`.
fn signing_bytes(
    payload: &UpdatePayload,
    proof_options: &DataIntegrityProof,
) -> Result<[u8; 32], crate::error::DocumentError> {
    let payload_hash = canonical::canonical_hash(payload)?;
    let proof_hash = canonical::canonical_hash(proof_options)?;
    let mut combined = Vec::with_capacity(64);
    combined.extend_from_slice(&payload_hash);
    combined.extend_from_slice(&proof_hash);
    Ok(canonical::sha256(&combined))
}

/// Verify a secured update's `proofValue` against `pubkey`.
pub fn verify_secured_update(
    secured: &SecuredUpdate,
    pubkey: &bitcoin::secp256k1::XOnlyPublicKey,
) -> bool {
    let Ok(sig_bytes) = hex::decode(&secured.proof.proof_value) else {
        return false;
    };
    let Ok(signature) = bitcoin::secp256k1::schnorr::Signature::from_slice(&sig_bytes) else {
        return false;
    };
    let Ok(signing_input) = signing_bytes(&secured.payload, &secured.proof.without_value()) else {
        return false;
    };
    let secp = Secp256k1::new();
    let msg = Message::from_digest(signing_input);
    secp.verify_schnorr(&signature, &msg, pubkey).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multikey;

    fn sample_signing_key() -> bitcoin::PrivateKey {
        bitcoin::PrivateKey::from_slice(&[9u8; 32], bitcoin::NetworkKind::Main).unwrap()
    }

    fn sample_source() -> (Document, String) {
        let did = "did:btcr2:k1qqpnp4206rw5yznwt7xnvf847dyzet34pauatur4806mamuu9kg670qvqx7vy".to_string();
        let mut doc = Document::empty(did.clone());
        let secp = Secp256k1::new();
        let key = sample_signing_key();
        let pubkey = key.public_key(&secp);
        let multibase = multikey::public_key_multibase(&pubkey.to_bytes()).unwrap();
        let vm_id = format!("{did}#initialKey");
        let vm = VerificationMethod::multikey(vm_id.clone(), did.clone(), multibase);
        doc.verification_method.push(vm);
        doc.capability_invocation
            .push(crate::document::model::RelationshipEntry::Reference(vm_id));
        (doc, did)
    }

    #[test]
    fn add_verification_method_keeps_patch_and_target_in_sync() {
        let (source, did) = sample_source();
        let mut updater = Updater::new(source);
        let key = sample_signing_key();
        let secp = Secp256k1::new();
        let pubkey = key.public_key(&secp);
        let multibase = multikey::public_key_multibase(&pubkey.to_bytes()).unwrap();
        let new_id = updater.add_verification_method(VerificationMethod::multikey(
            format!("{did}#key-2"),
            did.clone(),
            multibase,
        ));
        assert_eq!(new_id, format!("{did}#key-2"));
        updater.validate_update().unwrap();
    }

    #[test]
    fn finalize_update_payload_self_verifies() {
        let (source, did) = sample_source();
        let vm_id = source.verification_method[0].id.clone();
        let mut updater = Updater::new(source);
        updater.add_service(Service {
            id: format!("{did}#beacon-1"),
            type_: "SingletonBeacon".to_string(),
            service_endpoint: "bitcoin:bc1qexampleaddress".to_string(),
        });
        let payload = updater.construct_update_payload(2).unwrap();
        let key = sample_signing_key();
        let secured = updater
            .finalize_update_payload(payload, &did, vm_id, &key)
            .unwrap();

        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(&secp, &key.inner);
        assert!(verify_secured_update(&secured, &keypair.x_only_public_key().0));
    }

    #[test]
    fn tampered_proof_value_fails_verification() {
        let (source, did) = sample_source();
        let vm_id = source.verification_method[0].id.clone();
        let mut updater = Updater::new(source);
        updater.add_service(Service {
            id: format!("{did}#beacon-1"),
            type_: "SingletonBeacon".to_string(),
            service_endpoint: "bitcoin:bc1qexampleaddress".to_string(),
        });
        let payload = updater.construct_update_payload(2).unwrap();
        let key = sample_signing_key();
        let mut secured = updater
            .finalize_update_payload(payload, &did, vm_id, &key)
            .unwrap();
        secured.proof.proof_value = "00".repeat(64);

        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(&secp, &key.inner);
        assert!(!verify_secured_update(&secured, &keypair.x_only_public_key().0));
    }
}
