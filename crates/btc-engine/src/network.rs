use std::str::FromStr;

use crate::error::BtcError;

/// Default Esplora endpoint for Bitcoin mainnet.
pub const MAINNET_API: &str = "blockstream.info/api";

/// Default Esplora endpoint for Bitcoin testnet.
pub const TESTNET_API: &str = "blockstream.info/testnet/api";

/// Default Esplora endpoint for Bitcoin signet.
pub const SIGNET_API: &str = "mempool.space/signet/api";

/// Default Esplora endpoint for a local regtest stack.
pub const REGTEST_API: &str = "127.0.0.1:3002";

/// Supported Bitcoin networks and their encoding parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BtcNetwork {
    Mainnet,
    Testnet,
    Signet,
    Regtest,
}

impl BtcNetwork {
    /// Version byte of Base58Check P2PKH addresses.
    pub fn p2pkh_version(self) -> u8 {
        match self {
            BtcNetwork::Mainnet => 0x00,
            BtcNetwork::Testnet | BtcNetwork::Signet | BtcNetwork::Regtest => 0x6f,
        }
    }

    /// Version byte of WIF-encoded private keys.
    pub fn wif_version(self) -> u8 {
        match self {
            BtcNetwork::Mainnet => 0x80,
            BtcNetwork::Testnet | BtcNetwork::Signet | BtcNetwork::Regtest => 0xef,
        }
    }

    /// Human-readable part of segwit addresses.
    pub fn bech32_hrp(self) -> &'static str {
        match self {
            BtcNetwork::Mainnet => "bc",
            BtcNetwork::Testnet | BtcNetwork::Signet => "tb",
            BtcNetwork::Regtest => "bcrt",
        }
    }

    /// Default provider host (without scheme) for this network.
    pub fn default_api_host(self) -> &'static str {
        match self {
            BtcNetwork::Mainnet => MAINNET_API,
            BtcNetwork::Testnet => TESTNET_API,
            BtcNetwork::Signet => SIGNET_API,
            BtcNetwork::Regtest => REGTEST_API,
        }
    }

    /// Test networks share version bytes, so a WIF version byte can only
    /// tell mainnet apart from "some test network".
    pub fn is_test_network(self) -> bool {
        !matches!(self, BtcNetwork::Mainnet)
    }
}

impl std::fmt::Display for BtcNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BtcNetwork::Mainnet => write!(f, "mainnet"),
            BtcNetwork::Testnet => write!(f, "testnet"),
            BtcNetwork::Signet => write!(f, "signet"),
            BtcNetwork::Regtest => write!(f, "regtest"),
        }
    }
}

impl FromStr for BtcNetwork {
    type Err = BtcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "bitcoin" => Ok(BtcNetwork::Mainnet),
            "testnet" | "testnet3" => Ok(BtcNetwork::Testnet),
            "signet" => Ok(BtcNetwork::Signet),
            "regtest" => Ok(BtcNetwork::Regtest),
            other => Err(BtcError::NetworkMismatch {
                expected: "mainnet, testnet, signet or regtest".into(),
                actual: other.to_string(),
            }),
        }
    }
}
