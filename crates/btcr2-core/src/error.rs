use thiserror::Error;

/// Errors from the identifier codec (§4.1).
#[derive(Debug, Error)]
pub enum IdentifierError {
    #[error("DID method {found:?} is not supported (expected {expected:?})")]
    MethodNotSupported { expected: String, found: String },

    #[error("unknown human-readable part {0:?}")]
    UnknownHrp(String),

    #[error("bech32 decode failed: {0}")]
    Bech32(String),

    #[error("identifier did not use the bech32m checksum variant")]
    WrongChecksumVariant,

    #[error("filler nibble must be zero, found {0:#x}")]
    NonZeroFiller(u8),

    #[error("network nibble {0:#x} is not assigned")]
    UnassignedNetworkNibble(u8),

    #[error("header ended before a network nibble was read")]
    TruncatedHeader,

    #[error("KEY-type genesis bytes are not a valid compressed secp256k1 point: {0}")]
    InvalidKeyPoint(String),

    #[error("EXTERNAL-type genesis bytes must be exactly 32 bytes, got {0}")]
    WrongExternalLength(usize),
}

/// Errors from the multibase/multikey codec (§4.1 constants, §4.3).
#[derive(Debug, Error)]
pub enum MultikeyError {
    #[error("multibase string must start with 'z' (base58btc), got {0:?}")]
    UnsupportedMultibasePrefix(char),

    #[error("multibase string is empty")]
    Empty,

    #[error("base58 decode failed: {0}")]
    Base58(#[from] bs58::decode::Error),

    #[error("unknown multicodec prefix {0:#x}")]
    UnknownCodec(u64),

    #[error("invalid varint multicodec prefix")]
    InvalidVarint,

    #[error("key payload has wrong length for codec {codec:#x}: expected {expected}, got {found}")]
    WrongKeyLength {
        codec: u64,
        expected: usize,
        found: usize,
    },
}

/// Errors from the canonicalizer, document model, builder and placeholder transform (§3, §4.2, §4.3).
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("JSON canonicalization failed: {0}")]
    Jcs(String),

    #[error("JSON (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document id is not the placeholder DID")]
    NotPlaceholderRooted,

    #[error("service {0:?} is not a beacon service")]
    NotABeaconService(String),

    #[error("verification method {0:?} not found in document")]
    VerificationMethodNotFound(String),
}

/// Errors from the update engine (§4.5).
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("applying the accumulated patch produced hash {computed}, expected {expected}")]
    PatchMismatch { expected: String, computed: String },

    #[error("data-integrity proof did not verify")]
    InvalidProof,

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Errors from the beacon-signal constructor and beacon-manager (§4.4, §3).
#[derive(Debug, Error)]
pub enum BeaconError {
    #[error("beacon has no spendable UTXOs")]
    InsufficientFunds,

    #[error("UTXO value {value} does not cover fee {fee}")]
    AmountOutOfRange { value: u64, fee: u64 },

    #[error("signing the beacon signal input failed: {0}")]
    SigningFailed(String),

    #[error("beacon address could not be derived: {0}")]
    AddressDerivation(String),
}

/// Reasons a resolver fold step rejects an update as out of order (§4.7, §7).
#[derive(Debug, Error)]
pub enum LatePublishingReason {
    #[error("update sourceHash {found} does not match contemporary hash {expected}")]
    SourceHashMismatch { expected: String, found: String },

    #[error("duplicate update for version {version} has hash {found}, history says {expected}")]
    DuplicateHashMismatch {
        version: u64,
        expected: String,
        found: String,
    },

    #[error("update targetHash {found} does not match recomputed hash {expected}")]
    TargetHashMismatch { expected: String, found: String },

    #[error("update targetVersionId {found} skips ahead of current version {current}")]
    VersionSkip { current: u64, found: u64 },
}

/// Errors from the resolver (§4.7, §7).
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("cannot set both versionId and versionTime in resolution options")]
    InvalidResolutionOptions,

    #[error("no explorer configuration for network {0:?}")]
    UnsupportedNetwork(String),

    #[error(transparent)]
    LatePublishing(#[from] LatePublishingReason),

    #[error("sidecar data is missing or does not match the on-chain commitment")]
    InvalidSidecarData,

    #[error("computed DID {computed} does not match input DID {input}")]
    InvalidDid { input: String, computed: String },

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error("explorer request failed: {0}")]
    Explorer(String),
}

/// Single error type for callers who do not want to match on per-module variants.
#[derive(Debug, Error)]
pub enum Btcr2Error {
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error(transparent)]
    Multikey(#[from] MultikeyError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error(transparent)]
    Beacon(#[from] BeaconError),

    #[error(transparent)]
    Resolver(#[from] ResolverError),
}
