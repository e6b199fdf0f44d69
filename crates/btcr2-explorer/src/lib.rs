//! # btcr2-explorer
//!
//! `reqwest`-backed implementation of `btcr2_core::explorer::ExplorerClient`
//! against an Esplora-compatible HTTP API (SPEC_FULL §10.2).
//!
//! This crate is the workspace's sole point of network I/O. `btcr2-core`
//! never links `reqwest`; it is generic over the `ExplorerClient` trait and
//! receives an implementation (a bare `EsploraClient` or an `ExplorerPool`
//! scoped to a network) from the caller.

mod client;
mod esplora;
mod pool;

pub use client::EsploraClient;
pub use pool::{ExplorerPool, ScopedExplorer};
