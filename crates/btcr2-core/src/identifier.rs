//! The `did:btcr2` identifier codec (SPEC_FULL §4.1).
//!
//! The opaque tail of a DID is `<hrp>1<bech32m-payload>` where
//! `hrp ∈ {k, x}`. The payload, once unpacked from 5-bit groups, is
//! `header || genesis_bytes`, where `header` is a run-length-coded nibble
//! sequence carrying `(version, network)`.

use bech32::{FromBase32, ToBase32, Variant};

use crate::config::Network;
use crate::error::IdentifierError;

/// The placeholder DID used in intermediate documents (SPEC_FULL §3).
/// 60 `x` characters after the method prefix.
pub const PLACEHOLDER_TAIL: &str =
    "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx";

/// The DID method name this crate implements.
pub const METHOD: &str = "btcr2";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdType {
    Key,
    External,
}

impl IdType {
    fn hrp(self) -> &'static str {
        match self {
            IdType::Key => "k",
            IdType::External => "x",
        }
    }

    fn from_hrp(hrp: &str) -> Result<IdType, IdentifierError> {
        match hrp {
            "k" => Ok(IdType::Key),
            "x" => Ok(IdType::External),
            other => Err(IdentifierError::UnknownHrp(other.to_string())),
        }
    }
}

/// A decoded `did:btcr2` identifier: `(id_type, version, network, genesis_bytes)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identifier {
    pub id_type: IdType,
    pub version: u32,
    pub network: Network,
    pub genesis_bytes: Vec<u8>,
}

impl Identifier {
    /// Build an identifier for a KEY-type DID. `genesis_bytes` must be a
    /// compressed secp256k1 point (33 bytes, leading `0x02`/`0x03`).
    pub fn new_key(
        version: u32,
        network: Network,
        genesis_bytes: Vec<u8>,
    ) -> Result<Identifier, IdentifierError> {
        validate_compressed_point(&genesis_bytes)?;
        Ok(Identifier {
            id_type: IdType::Key,
            version,
            network,
            genesis_bytes,
        })
    }

    /// Build an identifier for an EXTERNAL-type DID. `genesis_bytes` must
    /// be exactly 32 bytes (a digest).
    pub fn new_external(
        version: u32,
        network: Network,
        genesis_bytes: Vec<u8>,
    ) -> Result<Identifier, IdentifierError> {
        if genesis_bytes.len() != 32 {
            return Err(IdentifierError::WrongExternalLength(genesis_bytes.len()));
        }
        Ok(Identifier {
            id_type: IdType::External,
            version,
            network,
            genesis_bytes,
        })
    }

    /// Encode this identifier as the opaque tail that follows `did:btcr2:`.
    pub fn encode(&self) -> Result<String, IdentifierError> {
        let header = encode_header(self.version, self.network);
        let mut payload = header;
        payload.extend_from_slice(&self.genesis_bytes);

        bech32::encode(self.id_type.hrp(), payload.to_base32(), Variant::Bech32m)
            .map_err(|e| IdentifierError::Bech32(e.to_string()))
    }

    /// Encode the full DID string, `did:btcr2:<tail>`.
    pub fn to_did(&self) -> Result<String, IdentifierError> {
        Ok(format!("did:{}:{}", METHOD, self.encode()?))
    }

    /// Decode the opaque tail of a DID (everything after `did:btcr2:`).
    pub fn decode(tail: &str) -> Result<Identifier, IdentifierError> {
        let (hrp, data, variant) =
            bech32::decode(tail).map_err(|e| IdentifierError::Bech32(e.to_string()))?;
        if variant != Variant::Bech32m {
            return Err(IdentifierError::WrongChecksumVariant);
        }
        let id_type = IdType::from_hrp(&hrp)?;
        let payload = Vec::<u8>::from_base32(&data)
            .map_err(|e| IdentifierError::Bech32(e.to_string()))?;

        let (version, network, header_len) = decode_header(&payload)?;
        let genesis_bytes = payload[header_len..].to_vec();

        match id_type {
            IdType::Key => validate_compressed_point(&genesis_bytes)?,
            IdType::External => {
                // Length is enforced by producers; the decoder returns raw
                // bytes unchecked, per SPEC_FULL §4.1.
            }
        }

        Ok(Identifier {
            id_type,
            version,
            network,
            genesis_bytes,
        })
    }

    /// Parse a full DID string of the form `did:btcr2:<tail>`.
    pub fn parse_did(did: &str) -> Result<Identifier, IdentifierError> {
        let mut parts = did.splitn(3, ':');
        let scheme = parts.next().unwrap_or_default();
        let method = parts.next().unwrap_or_default();
        let tail = parts.next().ok_or_else(|| IdentifierError::Bech32("missing tail".into()))?;

        if scheme != "did" {
            return Err(IdentifierError::Bech32("missing 'did:' scheme".into()));
        }
        if method != METHOD {
            return Err(IdentifierError::MethodNotSupported {
                expected: METHOD.to_string(),
                found: method.to_string(),
            });
        }
        Identifier::decode(tail)
    }
}

fn validate_compressed_point(bytes: &[u8]) -> Result<(), IdentifierError> {
    bitcoin::secp256k1::PublicKey::from_slice(bytes)
        .map(|_| ())
        .map_err(|e| IdentifierError::InvalidKeyPoint(e.to_string()))
}

/// Pack `(version, network)` into the header nibble stream, byte-aligned
/// (appending a zero filler nibble if the nibble count is odd).
fn encode_header(version: u32, network: Network) -> Vec<u8> {
    let mut nibbles = Vec::new();
    let run = (version - 1) / 15;
    let terminator = ((version - 1) % 15) as u8;
    for _ in 0..run {
        nibbles.push(0xF);
    }
    nibbles.push(terminator);
    nibbles.push(network.wire_nibble());
    if nibbles.len() % 2 == 1 {
        nibbles.push(0x0);
    }
    pack_nibbles(&nibbles)
}

/// Decode `(version, network)` from the front of `payload`, returning the
/// number of bytes the header consumed.
fn decode_header(payload: &[u8]) -> Result<(u32, Network, usize), IdentifierError> {
    let nibble_at = |i: usize| -> Option<u8> {
        let byte = *payload.get(i / 2)?;
        Some(if i % 2 == 0 { byte >> 4 } else { byte & 0x0F })
    };

    let mut idx = 0usize;
    let mut run: u32 = 0;
    let terminator = loop {
        let n = nibble_at(idx).ok_or(IdentifierError::TruncatedHeader)?;
        idx += 1;
        if n == 0xF {
            run += 1;
        } else {
            break n;
        }
    };
    let version = run * 15 + terminator as u32 + 1;

    let network_nibble = nibble_at(idx).ok_or(IdentifierError::TruncatedHeader)?;
    idx += 1;
    let network = Network::from_wire_nibble(network_nibble)
        .ok_or(IdentifierError::UnassignedNetworkNibble(network_nibble))?;

    if idx % 2 == 1 {
        let filler = nibble_at(idx).ok_or(IdentifierError::TruncatedHeader)?;
        if filler != 0 {
            return Err(IdentifierError::NonZeroFiller(filler));
        }
        idx += 1;
    }

    Ok((version, network, idx / 2))
}

fn pack_nibbles(nibbles: &[u8]) -> Vec<u8> {
    nibbles
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn version_one_header_is_a_single_byte() {
        let header = encode_header(1, Network::Bitcoin);
        assert_eq!(header, vec![0x00]);
        let header = encode_header(1, Network::UserDefined(1));
        assert_eq!(header, vec![0x0C]);
    }

    #[test]
    fn header_round_trips_for_all_named_networks() {
        for net in Network::NAMED {
            let header = encode_header(1, net);
            let (version, decoded_net, len) = decode_header(&header).unwrap();
            assert_eq!(version, 1);
            assert_eq!(decoded_net, net);
            assert_eq!(len, header.len());
        }
    }

    #[test]
    fn header_round_trips_for_future_version() {
        // version 17 => (version - 1) = 16 => one 0xF run nibble, terminator 1.
        let header = encode_header(17, Network::Regtest);
        let (version, net, len) = decode_header(&header).unwrap();
        assert_eq!(version, 17);
        assert_eq!(net, Network::Regtest);
        assert_eq!(len, header.len());
    }

    #[test]
    fn nonzero_filler_is_rejected() {
        // nibbles [0x0 (terminator), network=Bitcoin(0x0), filler=0x1] packed as bytes.
        let bytes = pack_nibbles(&[0x0, 0x0, 0x1]);
        let err = decode_header(&bytes).unwrap_err();
        assert!(matches!(err, IdentifierError::NonZeroFiller(0x1)));
    }

    #[test]
    fn key_scenario_round_trips() {
        // Genesis bytes from the bech32m decode scenario (SPEC_FULL §8.2), mainnet.
        let genesis = hex!("02be8aa46e14038248c5cb6fd744a9f186de440344634b7bef02e830b0e2e90826");
        let id = Identifier::new_key(1, Network::Bitcoin, genesis.to_vec()).unwrap();
        let tail = id.encode().unwrap();
        let decoded = Identifier::decode(&tail).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn bech32m_decode_scenario() {
        let decoded = Identifier::decode(
            "k1qqptaz4ydc2q8qjgch9kl46y48ccdhjyqdzxxjmmaupwsv9sut5ssfsm0s3dn",
        )
        .unwrap();
        assert_eq!(decoded.id_type, IdType::Key);
        assert_eq!(decoded.version, 1);
        assert_eq!(decoded.network, Network::Bitcoin);
    }

    #[test]
    fn wrong_method_is_rejected() {
        let err = Identifier::parse_did("did:example:abc").unwrap_err();
        assert!(matches!(err, IdentifierError::MethodNotSupported { .. }));
    }

    #[test]
    fn external_identifier_requires_32_bytes() {
        let err = Identifier::new_external(1, Network::Bitcoin, vec![0u8; 31]).unwrap_err();
        assert!(matches!(err, IdentifierError::WrongExternalLength(31)));
    }
}
