//! Multibase/multikey codec (SPEC_FULL §4.1 constants, §4.3).
//!
//! A `publicKeyMultibase` value is `z` (the `base58btc` multibase prefix)
//! followed by base58btc of `multicodec-varint || key-bytes`.

use crate::error::MultikeyError;

/// Known multicodec key types. Only `Secp256k1Pub` is exercised by the
/// live document builder (the `#initialKey` verification method); the
/// x-only codecs exist so the constant table matches the wire spec but
/// have no construction path in this revision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyCodec {
    /// Full compressed secp256k1 public key (33 bytes).
    Secp256k1Pub,
    /// BIP-340 x-only public key (32 bytes).
    Bip340Pub,
    /// BIP-340 x-only secret key (32 bytes).
    Bip340Priv,
}

impl KeyCodec {
    pub fn code(self) -> u64 {
        match self {
            KeyCodec::Secp256k1Pub => 0xe7,
            KeyCodec::Bip340Pub => 0x2561,
            KeyCodec::Bip340Priv => 0x130e,
        }
    }

    pub fn from_code(code: u64) -> Result<KeyCodec, MultikeyError> {
        match code {
            0xe7 => Ok(KeyCodec::Secp256k1Pub),
            0x2561 => Ok(KeyCodec::Bip340Pub),
            0x130e => Ok(KeyCodec::Bip340Priv),
            other => Err(MultikeyError::UnknownCodec(other)),
        }
    }

    pub fn expected_len(self) -> usize {
        match self {
            KeyCodec::Secp256k1Pub => 33,
            KeyCodec::Bip340Pub | KeyCodec::Bip340Priv => 32,
        }
    }
}

/// Encode `key_bytes` as a `did:key`-style multibase string under `codec`.
pub fn encode_multikey(codec: KeyCodec, key_bytes: &[u8]) -> Result<String, MultikeyError> {
    if key_bytes.len() != codec.expected_len() {
        return Err(MultikeyError::WrongKeyLength {
            codec: codec.code(),
            expected: codec.expected_len(),
            found: key_bytes.len(),
        });
    }
    let mut payload = varint_encode(codec.code());
    payload.extend_from_slice(key_bytes);
    Ok(format!("z{}", bs58::encode(payload).into_string()))
}

/// Decode a multibase string into its codec and raw key bytes.
pub fn decode_multikey(s: &str) -> Result<(KeyCodec, Vec<u8>), MultikeyError> {
    let mut chars = s.chars();
    let prefix = chars.next().ok_or(MultikeyError::Empty)?;
    if prefix != 'z' {
        return Err(MultikeyError::UnsupportedMultibasePrefix(prefix));
    }
    let rest: String = chars.collect();
    let decoded = bs58::decode(rest).into_vec()?;
    let (code, consumed) = varint_decode(&decoded).ok_or(MultikeyError::InvalidVarint)?;
    let codec = KeyCodec::from_code(code)?;
    let key_bytes = decoded[consumed..].to_vec();
    if key_bytes.len() != codec.expected_len() {
        return Err(MultikeyError::WrongKeyLength {
            codec: code,
            expected: codec.expected_len(),
            found: key_bytes.len(),
        });
    }
    Ok((codec, key_bytes))
}

/// Convenience wrapper used by the document builder for `#initialKey`:
/// encode a full compressed secp256k1 public key as `publicKeyMultibase`.
pub fn public_key_multibase(compressed_pubkey: &[u8]) -> Result<String, MultikeyError> {
    encode_multikey(KeyCodec::Secp256k1Pub, compressed_pubkey)
}

fn varint_encode(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
    out
}

fn varint_decode(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    for (i, &byte) in bytes.iter().enumerate() {
        value |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
        shift += 7;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secp256k1_pub_round_trips() {
        let key = [0x02u8; 33];
        let encoded = encode_multikey(KeyCodec::Secp256k1Pub, &key).unwrap();
        assert!(encoded.starts_with('z'));
        let (codec, decoded) = decode_multikey(&encoded).unwrap();
        assert_eq!(codec, KeyCodec::Secp256k1Pub);
        assert_eq!(decoded, key);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = encode_multikey(KeyCodec::Secp256k1Pub, &[0u8; 10]).unwrap_err();
        assert!(matches!(err, MultikeyError::WrongKeyLength { .. }));
    }

    #[test]
    fn varint_round_trips_multibyte_codes() {
        for code in [0xe7u64, 0x2561, 0x130e] {
            let bytes = varint_encode(code);
            let (decoded, consumed) = varint_decode(&bytes).unwrap();
            assert_eq!(decoded, code);
            assert_eq!(consumed, bytes.len());
        }
    }

    #[test]
    fn unsupported_multibase_prefix_is_rejected() {
        let err = decode_multikey("mabc").unwrap_err();
        assert!(matches!(err, MultikeyError::UnsupportedMultibasePrefix('m')));
    }
}
