//! Network identification and the per-network parameter table (SPEC_FULL §3, §10.3).

use serde::{Deserialize, Serialize};

/// A `did:btcr2` network, as named in the identifier's header nibble.
///
/// Wire order matters: the nibble written on the wire is this variant's
/// position below for the six named networks, not an alphabetical or
/// otherwise "natural" order. `UserDefined` carries the small integer
/// `1..=4` packed into nibbles `0xC..=0xF`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    Bitcoin,
    Signet,
    Regtest,
    Testnet3,
    Testnet4,
    Mutinynet,
    UserDefined(u8),
}

impl Network {
    /// The six named networks, in their load-bearing wire order.
    pub const NAMED: [Network; 6] = [
        Network::Bitcoin,
        Network::Signet,
        Network::Regtest,
        Network::Testnet3,
        Network::Testnet4,
        Network::Mutinynet,
    ];

    /// The 4-bit nibble this network is encoded as in an identifier header.
    pub fn wire_nibble(self) -> u8 {
        match self {
            Network::Bitcoin => 0x0,
            Network::Signet => 0x1,
            Network::Regtest => 0x2,
            Network::Testnet3 => 0x3,
            Network::Testnet4 => 0x4,
            Network::Mutinynet => 0x5,
            Network::UserDefined(n) => 0xB + n,
        }
    }

    /// Decode a network from its wire nibble. Nibbles `0x6..=0xB` are
    /// reserved and unassigned.
    pub fn from_wire_nibble(nibble: u8) -> Option<Network> {
        match nibble {
            0x0 => Some(Network::Bitcoin),
            0x1 => Some(Network::Signet),
            0x2 => Some(Network::Regtest),
            0x3 => Some(Network::Testnet3),
            0x4 => Some(Network::Testnet4),
            0x5 => Some(Network::Mutinynet),
            0xC..=0xF => Some(Network::UserDefined(nibble - 0xB)),
            _ => None,
        }
    }

    /// The display name used in `didDocumentMetadata.network`.
    pub fn display_name(self) -> String {
        match self {
            Network::Bitcoin => "bitcoin".to_string(),
            Network::Signet => "signet".to_string(),
            Network::Regtest => "regtest".to_string(),
            Network::Testnet3 => "testnet3".to_string(),
            Network::Testnet4 => "testnet4".to_string(),
            Network::Mutinynet => "mutinynet".to_string(),
            Network::UserDefined(n) => n.to_string(),
        }
    }

    /// The `bitcoin` crate network used to derive addresses for this
    /// network (SPEC_FULL §4.3's network-display mapping). User-defined
    /// networks map to `Signet` — a preserved quirk, not a design choice
    /// (SPEC_FULL §9).
    pub fn bitcoin_network(self) -> bitcoin::Network {
        match self {
            Network::Bitcoin => bitcoin::Network::Bitcoin,
            Network::Testnet3 | Network::Testnet4 => bitcoin::Network::Testnet,
            Network::Mutinynet | Network::Signet => bitcoin::Network::Signet,
            Network::Regtest => bitcoin::Network::Regtest,
            Network::UserDefined(_) => bitcoin::Network::Signet,
        }
    }
}

/// Static per-network parameters needed by embedders: the target block
/// interval (used by the resolver to map `versionTime` to a block-height
/// horizon) and the default Esplora-compatible explorer base URL.
///
/// This table is plain data, not a config-file loader — `btcr2-core` has
/// no file-based configuration surface, matching the rest of the
/// workspace's dependency stack.
#[derive(Clone, Copy, Debug)]
pub struct NetworkParams {
    pub network: Network,
    pub block_interval_secs: u64,
    pub explorer_base_url: Option<&'static str>,
}

impl NetworkParams {
    pub const BITCOIN: NetworkParams = NetworkParams {
        network: Network::Bitcoin,
        block_interval_secs: 600,
        explorer_base_url: Some("https://blockstream.info/api"),
    };

    pub const SIGNET: NetworkParams = NetworkParams {
        network: Network::Signet,
        block_interval_secs: 600,
        explorer_base_url: Some("https://mempool.space/signet/api"),
    };

    pub const REGTEST: NetworkParams = NetworkParams {
        network: Network::Regtest,
        block_interval_secs: 600,
        explorer_base_url: None,
    };

    pub const TESTNET3: NetworkParams = NetworkParams {
        network: Network::Testnet3,
        block_interval_secs: 600,
        explorer_base_url: Some("https://blockstream.info/testnet/api"),
    };

    pub const TESTNET4: NetworkParams = NetworkParams {
        network: Network::Testnet4,
        block_interval_secs: 600,
        explorer_base_url: Some("https://mempool.space/testnet4/api"),
    };

    pub const MUTINYNET: NetworkParams = NetworkParams {
        network: Network::Mutinynet,
        block_interval_secs: 30,
        explorer_base_url: Some("https://mutinynet.com/api"),
    };

    /// Defaults for the six named networks. User-defined networks (1..4)
    /// have no fixed URL or block interval; the embedder supplies them.
    pub fn defaults_for(network: Network) -> Option<NetworkParams> {
        match network {
            Network::Bitcoin => Some(Self::BITCOIN),
            Network::Signet => Some(Self::SIGNET),
            Network::Regtest => Some(Self::REGTEST),
            Network::Testnet3 => Some(Self::TESTNET3),
            Network::Testnet4 => Some(Self::TESTNET4),
            Network::Mutinynet => Some(Self::MUTINYNET),
            Network::UserDefined(_) => None,
        }
    }
}

/// `21_000_000 * 10^8` — the maximum number of satoshis that can ever exist.
pub const MAX_BTC_SUPPLY_SATOSHIS: u64 = 21_000_000 * 100_000_000;

/// Default transaction fee for beacon signals, in satoshis.
pub const DEFAULT_TX_FEE: u64 = 4000;

/// Number of bech32 characters used for the checksum.
pub const BECH32_CHECKSUM_LEN: usize = 6;
