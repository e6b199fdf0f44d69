//! # btcr2-core
//!
//! Pure Rust `did:btcr2` identifier, document, beacon and resolver logic.
//!
//! This crate contains **no networking code**. Every piece of on-chain
//! data — a beacon transaction, a sidecar update payload, a signed proof —
//! passes through these verification functions before being trusted.
//!
//! ## Trust model
//!
//! - **Identifier codec** (`identifier` module): the DID string is a
//!   checksummed encoding of `(id_type, version, network, genesis_bytes)`.
//!   Decoding never trusts the string beyond what the bech32m checksum and
//!   the id-type's own validation (a valid compressed point for KEY, any
//!   32 bytes for EXTERNAL) allow.
//! - **Resolver** (`resolver` module): walks confirmed chain history and
//!   accepts an update only if its proof verifies against the contemporary
//!   document and its hash chain matches exactly. A resolution either
//!   succeeds with a fully verified document or fails outright — there is
//!   no partial trust.
//! - **Networking** is out of scope here. `explorer` declares the
//!   `ExplorerClient`/`Keystore` traits a caller must supply; the sibling
//!   `btcr2-explorer` crate implements them against a real Esplora API.
//!
//! ## Usage
//!
//! ```ignore
//! use btcr2_core::identifier::Identifier;
//! use btcr2_core::document::builder::from_secp256k1_key;
//! use btcr2_core::resolver::resolve;
//! ```

pub mod beacon;
pub mod canonical;
pub mod config;
pub mod did_manager;
pub mod document;
pub mod error;
pub mod explorer;
pub mod identifier;
pub mod multikey;
pub mod resolver;
pub mod update;

pub use config::{Network, NetworkParams};
pub use did_manager::{DidManager, PersistedState, SidecarPayload};
pub use error::Btcr2Error;
pub use identifier::{IdType, Identifier};
