//! Document construction paths (SPEC_FULL §4.3).

use bitcoin::key::{CompressedPublicKey, PublicKey};
use bitcoin::secp256k1::{self, Secp256k1};
use bitcoin::{Address, XOnlyPublicKey};

use crate::canonical;
use crate::config::Network;
use crate::document::model::{Document, RelationshipEntry, Service, VerificationMethod};
use crate::document::placeholder;
use crate::error::{DocumentError, IdentifierError};
use crate::identifier::Identifier;
use crate::multikey;

/// An intermediate document under construction, rooted at the placeholder
/// DID. Verification methods and services added here (beyond the initial
/// key, for KEY-type genesis) are referenced from relationship arrays by
/// URL, not embedded (SPEC_FULL §4.3).
pub struct IntermediateBuilder {
    doc: Document,
}

impl IntermediateBuilder {
    pub fn new() -> Self {
        IntermediateBuilder {
            doc: Document::empty(placeholder::placeholder_did()),
        }
    }

    pub fn with_controller(mut self, controllers: Vec<String>) -> Self {
        self.doc.controller = Some(controllers);
        self
    }

    /// Add a Multikey verification method and return its id (fragment
    /// included) so the caller can reference it from relationship arrays.
    pub fn add_verification_method(&mut self, fragment: &str, public_key_multibase: String) -> String {
        let id = format!("{}#{}", self.doc.id, fragment);
        self.doc.verification_method.push(VerificationMethod::multikey(
            id.clone(),
            self.doc.id.clone(),
            public_key_multibase,
        ));
        id
    }

    pub fn reference_authentication(&mut self, vm_id: String) {
        self.doc.authentication.push(RelationshipEntry::Reference(vm_id));
    }

    pub fn reference_assertion_method(&mut self, vm_id: String) {
        self.doc
            .assertion_method
            .push(RelationshipEntry::Reference(vm_id));
    }

    pub fn reference_capability_invocation(&mut self, vm_id: String) {
        self.doc
            .capability_invocation
            .push(RelationshipEntry::Reference(vm_id));
    }

    pub fn reference_capability_delegation(&mut self, vm_id: String) {
        self.doc
            .capability_delegation
            .push(RelationshipEntry::Reference(vm_id));
    }

    pub fn reference_key_agreement(&mut self, vm_id: String) {
        self.doc.key_agreement.push(RelationshipEntry::Reference(vm_id));
    }

    pub fn add_singleton_beacon(&mut self, fragment: &str, beacon_address: &str) -> String {
        let id = format!("{}#{}", self.doc.id, fragment);
        self.doc.service.push(Service {
            id: id.clone(),
            type_: "SingletonBeacon".to_string(),
            service_endpoint: format!("bitcoin:{beacon_address}"),
        });
        id
    }

    pub fn build(self) -> Document {
        self.doc
    }
}

impl Default for IntermediateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a KEY-type DID and its initial document from a compressed
/// secp256k1 public key (SPEC_FULL §4.3, §4.6 `create_deterministic`).
pub fn from_secp256k1_key(
    pubkey: &secp256k1::PublicKey,
    network: Network,
    version: u32,
) -> Result<(String, Document), DocumentError> {
    let secp = Secp256k1::new();
    let compressed = pubkey.serialize();

    let identifier = Identifier::new_key(version, network, compressed.to_vec())
        .map_err(|e| DocumentError::Jcs(e.to_string()))?;
    let did = identifier
        .to_did()
        .map_err(|e| DocumentError::Jcs(e.to_string()))?;

    let mut doc = Document::empty(did.clone());

    let vm_id = format!("{did}#initialKey");
    let multibase = multikey::public_key_multibase(&compressed).map_err(|e| DocumentError::Jcs(e.to_string()))?;
    doc.verification_method.push(VerificationMethod::multikey(
        vm_id.clone(),
        did.clone(),
        multibase,
    ));
    doc.authentication
        .push(RelationshipEntry::Reference(vm_id.clone()));
    doc.assertion_method
        .push(RelationshipEntry::Reference(vm_id.clone()));
    doc.capability_invocation
        .push(RelationshipEntry::Reference(vm_id.clone()));
    doc.capability_delegation
        .push(RelationshipEntry::Reference(vm_id.clone()));

    let bitcoin_network = network.bitcoin_network();
    let btc_pubkey = PublicKey::new(*pubkey);
    let compressed_pubkey = CompressedPublicKey::from_slice(&compressed)
        .map_err(|e| DocumentError::Jcs(format!("invalid compressed key: {e}")))?;
    let xonly = XOnlyPublicKey::from(*pubkey);

    let p2pkh = Address::p2pkh(btc_pubkey, bitcoin_network);
    let p2wpkh = Address::p2wpkh(&compressed_pubkey, bitcoin_network);
    let p2tr = Address::p2tr(&secp, xonly, None, bitcoin_network);

    doc.service.push(Service {
        id: format!("{did}#initialP2PKH"),
        type_: "SingletonBeacon".to_string(),
        service_endpoint: format!("bitcoin:{p2pkh}"),
    });
    doc.service.push(Service {
        id: format!("{did}#initialP2WPKH"),
        type_: "SingletonBeacon".to_string(),
        service_endpoint: format!("bitcoin:{p2wpkh}"),
    });
    doc.service.push(Service {
        id: format!("{did}#initialP2TR"),
        type_: "SingletonBeacon".to_string(),
        service_endpoint: format!("bitcoin:{p2tr}"),
    });

    Ok((did, doc))
}

/// Derive a KEY-type DID and document from its identifier's genesis bytes
/// alone (used by the resolver to rebuild the bootstrap document and
/// confirm the computed DID matches the input, SPEC_FULL §4.7).
pub fn from_key_genesis_bytes(
    genesis_bytes: &[u8],
    network: Network,
    version: u32,
) -> Result<(String, Document), DocumentError> {
    let pubkey = secp256k1::PublicKey::from_slice(genesis_bytes)
        .map_err(|e| DocumentError::Jcs(IdentifierError::InvalidKeyPoint(e.to_string()).to_string()))?;
    from_secp256k1_key(&pubkey, network, version)
}

/// Produce the EXTERNAL-type genesis bytes for an intermediate document
/// (SPEC_FULL §4.6 `create_external`): `SHA-256(JCS(serialize(doc)))`.
pub fn external_genesis_bytes(intermediate: &Document) -> Result<[u8; 32], DocumentError> {
    if intermediate.id != placeholder::placeholder_did() {
        return Err(DocumentError::NotPlaceholderRooted);
    }
    canonical::canonical_hash(intermediate)
}

/// Salvage a bound document back into an intermediate one (SPEC_FULL §4.3
/// `from_doc`).
pub fn from_doc(doc: &Document) -> Document {
    placeholder::unbind(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::PrivateKey;
    use std::str::FromStr;

    #[test]
    fn key_round_trip_scenario() {
        // Scenario 1 of SPEC_FULL §8.
        let wif = "KyZpNDKnfs94vbrwhJneDi77V6jF64PWPF8x5cdJb8ifgg2DUc9d";
        let privkey = PrivateKey::from_str(wif).unwrap();
        let secp = Secp256k1::new();
        let pubkey = privkey.public_key(&secp).inner;

        let (did, doc) = from_secp256k1_key(&pubkey, Network::Bitcoin, 1).unwrap();
        assert_eq!(
            did,
            "did:btcr2:k1qqpnp4206rw5yznwt7xnvf847dyzet34pauatur4806mamuu9kg670qvqx7vy"
        );
        assert_eq!(doc.verification_method.len(), 1);
        assert_eq!(doc.verification_method[0].id, format!("{did}#initialKey"));
        assert_eq!(doc.authentication.len(), 1);
        assert_eq!(doc.assertion_method.len(), 1);
        assert_eq!(doc.capability_invocation.len(), 1);
        assert_eq!(doc.capability_delegation.len(), 1);
        assert_eq!(doc.service.len(), 3);
        let fragments: Vec<&str> = doc
            .service
            .iter()
            .map(|s| s.id.rsplit('#').next().unwrap())
            .collect();
        assert!(fragments.contains(&"initialP2PKH"));
        assert!(fragments.contains(&"initialP2WPKH"));
        assert!(fragments.contains(&"initialP2TR"));
    }

    #[test]
    fn external_genesis_binding_scenario() {
        // Scenario 4 of SPEC_FULL §8.
        let mut builder = IntermediateBuilder::new().with_controller(vec![placeholder::placeholder_did()]);
        let key1 = builder.add_verification_method("key1", "zAuth".to_string());
        let key2 = builder.add_verification_method("key2", "zCap".to_string());
        builder.reference_authentication(key1);
        builder.reference_capability_invocation(key2);
        let intermediate = builder.build();

        let genesis = external_genesis_bytes(&intermediate).unwrap();
        let identifier = Identifier::new_external(1, Network::Bitcoin, genesis.to_vec()).unwrap();
        let did = identifier.to_did().unwrap();

        let initial = placeholder::bind(&intermediate, &did);
        let serialized = serde_json::to_string(&initial).unwrap();
        assert!(!serialized.contains(&placeholder::placeholder_did()));

        let recovered_intermediate = from_doc(&initial);
        let recomputed_genesis = external_genesis_bytes(&recovered_intermediate).unwrap();
        assert_eq!(recomputed_genesis, genesis);
    }
}
