//! Update payload and secured-update wire types (SPEC_FULL §3).

use serde::{Deserialize, Serialize};

use crate::document::model::update_context;

/// The cryptosuite identifier for a `did:btcr2` data-integrity proof.
pub const CRYPTOSUITE: &str = "bip340-jcs-2025";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdatePayload {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub patch: Vec<json_patch::PatchOperation>,
    #[serde(rename = "sourceHash")]
    pub source_hash: String,
    #[serde(rename = "targetHash")]
    pub target_hash: String,
    #[serde(rename = "targetVersionId")]
    pub target_version_id: u64,
}

impl UpdatePayload {
    pub fn new(
        patch: Vec<json_patch::PatchOperation>,
        source_hash: String,
        target_hash: String,
        target_version_id: u64,
    ) -> Self {
        UpdatePayload {
            context: update_context(),
            patch,
            source_hash,
            target_hash,
            target_version_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataIntegrityProof {
    #[serde(rename = "type")]
    pub type_: String,
    pub cryptosuite: String,
    #[serde(rename = "verificationMethod")]
    pub verification_method: String,
    #[serde(rename = "proofPurpose")]
    pub proof_purpose: String,
    pub capability: String,
    #[serde(rename = "capabilityAction")]
    pub capability_action: String,
    #[serde(rename = "proofValue")]
    pub proof_value: String,
}

impl DataIntegrityProof {
    /// A copy of this proof with `proofValue` cleared — the "proof
    /// options" that get hashed alongside the payload when computing the
    /// signing/verification input.
    pub fn without_value(&self) -> DataIntegrityProof {
        DataIntegrityProof {
            proof_value: String::new(),
            ..self.clone()
        }
    }
}

/// An update payload with its detached data-integrity proof attached
/// (SPEC_FULL §3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SecuredUpdate {
    #[serde(flatten)]
    pub payload: UpdatePayload,
    pub proof: DataIntegrityProof,
}

/// `urn:zcap:root:<percent-encoded-did>`.
pub fn zcap_root_capability(did: &str) -> String {
    use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
    format!(
        "urn:zcap:root:{}",
        utf8_percent_encode(did, NON_ALPHANUMERIC)
    )
}
