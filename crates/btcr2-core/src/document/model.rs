//! The typed DID document model (SPEC_FULL §3, §4.3).

use serde::{Deserialize, Serialize};

use crate::canonical;
use crate::error::DocumentError;

/// Fixed `@context` for a DID document.
pub fn document_context() -> Vec<String> {
    vec![
        "https://www.w3.org/ns/did/v1".to_string(),
        "https://did-btcr2.github.io/did-btcr2/context/v1".to_string(),
        "https://w3id.org/security/data-integrity/v2".to_string(),
    ]
}

/// Fixed `@context` for an update payload.
pub fn update_context() -> Vec<String> {
    vec![
        "https://w3id.org/zcap/v1".to_string(),
        "https://w3id.org/security/data-integrity/v2".to_string(),
    ]
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub controller: String,
    #[serde(rename = "publicKeyMultibase")]
    pub public_key_multibase: String,
}

impl VerificationMethod {
    pub fn multikey(id: String, controller: String, public_key_multibase: String) -> Self {
        VerificationMethod {
            id,
            type_: "Multikey".to_string(),
            controller,
            public_key_multibase,
        }
    }
}

/// A relationship-array entry: either a fully embedded verification
/// method, or a URL reference to one declared elsewhere in the document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipEntry {
    Embedded(VerificationMethod),
    Reference(String),
}

impl RelationshipEntry {
    pub fn url(&self) -> &str {
        match self {
            RelationshipEntry::Embedded(vm) => &vm.id,
            RelationshipEntry::Reference(url) => url,
        }
    }
}

/// The three beacon service types (SPEC_FULL §3). SMT/CID aggregate
/// beacons are declared but unprocessed (SPEC_FULL §9) — they exist so
/// the type tag round-trips, not because this crate folds their signals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BeaconType {
    Singleton,
    SmtAggregate,
    CidAggregate,
}

impl BeaconType {
    pub fn as_str(self) -> &'static str {
        match self {
            BeaconType::Singleton => "SingletonBeacon",
            BeaconType::SmtAggregate => "SMTAggregateBeacon",
            BeaconType::CidAggregate => "CIDAggregateBeacon",
        }
    }

    pub fn from_str(s: &str) -> Option<BeaconType> {
        match s {
            "SingletonBeacon" => Some(BeaconType::Singleton),
            "SMTAggregateBeacon" => Some(BeaconType::SmtAggregate),
            "CIDAggregateBeacon" => Some(BeaconType::CidAggregate),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,
}

impl Service {
    pub fn beacon_type(&self) -> Option<BeaconType> {
        BeaconType::from_str(&self.type_)
    }

    /// The `bitcoin:<address>` service endpoint's bare address, if this
    /// is a beacon service.
    pub fn beacon_address(&self) -> Option<&str> {
        if self.beacon_type().is_none() {
            return None;
        }
        self.service_endpoint.strip_prefix("bitcoin:")
    }
}

/// A DID document (or, when rooted at the placeholder DID, an
/// "intermediate document" in the spec's terminology — same shape).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<Vec<String>>,
    #[serde(
        rename = "verificationMethod",
        skip_serializing_if = "Vec::is_empty",
        default
    )]
    pub verification_method: Vec<VerificationMethod>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub authentication: Vec<RelationshipEntry>,
    #[serde(
        rename = "assertionMethod",
        skip_serializing_if = "Vec::is_empty",
        default
    )]
    pub assertion_method: Vec<RelationshipEntry>,
    #[serde(
        rename = "capabilityInvocation",
        skip_serializing_if = "Vec::is_empty",
        default
    )]
    pub capability_invocation: Vec<RelationshipEntry>,
    #[serde(
        rename = "capabilityDelegation",
        skip_serializing_if = "Vec::is_empty",
        default
    )]
    pub capability_delegation: Vec<RelationshipEntry>,
    #[serde(rename = "keyAgreement", skip_serializing_if = "Vec::is_empty", default)]
    pub key_agreement: Vec<RelationshipEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub service: Vec<Service>,
}

impl Document {
    pub fn empty(id: String) -> Self {
        Document {
            context: document_context(),
            id,
            controller: None,
            verification_method: Vec::new(),
            authentication: Vec::new(),
            assertion_method: Vec::new(),
            capability_invocation: Vec::new(),
            capability_delegation: Vec::new(),
            key_agreement: Vec::new(),
            service: Vec::new(),
        }
    }

    /// `SHA-256(JCS(serialize(self)))`.
    pub fn canonicalize(&self) -> Result<[u8; 32], DocumentError> {
        canonical::canonical_hash(self)
    }

    /// `canonicalize()`, base58 encoded.
    pub fn canonical_hash_base58(&self) -> Result<String, DocumentError> {
        canonical::canonical_hash_base58(self)
    }

    pub fn find_verification_method(&self, id: &str) -> Option<&VerificationMethod> {
        self.verification_method.iter().find(|vm| vm.id == id)
    }

    pub fn beacon_services(&self) -> impl Iterator<Item = &Service> {
        self.service.iter().filter(|s| s.beacon_type().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_arrays_are_omitted_from_serialization() {
        let doc = Document::empty("did:btcr2:abc".to_string());
        let json = serde_json::to_string(&doc).unwrap();
        assert!(!json.contains("verificationMethod"));
        assert!(!json.contains("controller"));
        assert!(!json.contains("service"));
    }

    #[test]
    fn relationship_entry_round_trips_both_forms() {
        let reference = RelationshipEntry::Reference("did:btcr2:abc#key1".to_string());
        let json = serde_json::to_string(&reference).unwrap();
        assert_eq!(json, r#""did:btcr2:abc#key1""#);

        let embedded = RelationshipEntry::Embedded(VerificationMethod::multikey(
            "did:btcr2:abc#key1".to_string(),
            "did:btcr2:abc".to_string(),
            "zpub".to_string(),
        ));
        let json = serde_json::to_string(&embedded).unwrap();
        let back: RelationshipEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, embedded);
    }

    #[test]
    fn canonical_hash_is_stable_regardless_of_field_order_in_source_json() {
        let a: Document = serde_json::from_value(serde_json::json!({
            "@context": document_context(),
            "id": "did:btcr2:abc",
            "verificationMethod": [],
        }))
        .unwrap();
        let b = Document::empty("did:btcr2:abc".to_string());
        assert_eq!(a.canonicalize().unwrap(), b.canonicalize().unwrap());
    }
}
