//! JSON Canonicalization Scheme (JCS) + SHA-256 digesting (SPEC_FULL §4.2).
//!
//! `canonicalize(doc) = SHA-256(JCS(serialize(doc)))`. Hashes that appear
//! inside update payloads (`sourceHash`, `targetHash`) are additionally
//! base58 (Bitcoin alphabet) encoded.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::DocumentError;

/// Serialize `value` to its JCS byte form.
pub fn jcs_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, DocumentError> {
    serde_jcs::to_string(value)
        .map(|s| s.into_bytes())
        .map_err(|e| DocumentError::Jcs(e.to_string()))
}

/// SHA-256 of raw bytes.
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// `SHA-256(JCS(serialize(value)))`.
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<[u8; 32], DocumentError> {
    Ok(sha256(&jcs_bytes(value)?))
}

/// `canonical_hash`, base58 (Bitcoin alphabet) encoded — the form used for
/// `sourceHash`/`targetHash` inside update payloads.
pub fn canonical_hash_base58<T: Serialize>(value: &T) -> Result<String, DocumentError> {
    Ok(bs58::encode(canonical_hash(value)?).into_string())
}

pub fn base58_encode(bytes: &[u8]) -> String {
    bs58::encode(bytes).into_string()
}

pub fn base58_decode(s: &str) -> Result<Vec<u8>, DocumentError> {
    bs58::decode(s)
        .into_vec()
        .map_err(|e| DocumentError::Jcs(format!("invalid base58: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn jcs_sorts_object_keys() {
        let value = json!({"b": 1, "a": 2});
        let bytes = jcs_bytes(&value).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn canonical_hash_is_deterministic_under_key_order() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_hash(&a).unwrap(), canonical_hash(&b).unwrap());
    }

    #[test]
    fn base58_round_trips() {
        let bytes = sha256(b"hello");
        let encoded = base58_encode(&bytes);
        assert_eq!(base58_decode(&encoded).unwrap(), bytes.to_vec());
    }
}
