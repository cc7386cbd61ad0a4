//! Chain Descriptors
//!
//! The finite set of supported chains and their static descriptors
//! (explorer URL, native symbol, credential env var). Collectors are
//! resolved from this table at initialization, never by string lookup
//! at call time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Supported chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Bsc,
    Polygon,
}

impl Chain {
    /// All supported chains, in registration order
    pub const ALL: &'static [Chain] = &[Chain::Ethereum, Chain::Bsc, Chain::Polygon];

    /// Lowercase identifier used in config sections, registry names and logs
    pub fn id(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Bsc => "bsc",
            Chain::Polygon => "polygon",
        }
    }

    /// Static descriptor for this chain
    pub fn descriptor(&self) -> &'static ChainDescriptor {
        match self {
            Chain::Ethereum => &ETHEREUM,
            Chain::Bsc => &BSC,
            Chain::Polygon => &POLYGON,
        }
    }

    /// Parse a config-section identifier
    pub fn from_id(id: &str) -> Option<Chain> {
        Chain::ALL.iter().copied().find(|c| c.id() == id)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Asset class a collector watches on its chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    /// Native coin transfers (ETH, BNB, POL)
    Native,
    /// ERC-20 style token transfers
    Token,
}

impl AssetClass {
    pub fn id(&self) -> &'static str {
        match self {
            AssetClass::Native => "native",
            AssetClass::Token => "token",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Static per-chain configuration consumed by collectors
#[derive(Debug, Clone)]
pub struct ChainDescriptor {
    pub chain: Chain,
    /// Default explorer API base URL (overridable in config)
    pub explorer_url: &'static str,
    /// Native coin ticker
    pub native_symbol: &'static str,
    /// Price oracle asset id for the native coin
    pub native_asset_id: &'static str,
    /// Environment variable holding the explorer API key
    pub credential_env: &'static str,
    /// Default poll interval; chains with faster blocks poll more often
    pub default_poll_interval: Duration,
    /// Blocks held back from head before the live cursor starts,
    /// so shallow reorgs do not produce phantom events
    pub safety_margin: u64,
}

static ETHEREUM: ChainDescriptor = ChainDescriptor {
    chain: Chain::Ethereum,
    explorer_url: "https://api.etherscan.io/api",
    native_symbol: "ETH",
    native_asset_id: "ethereum",
    credential_env: "ETHERSCAN_API_KEY",
    default_poll_interval: Duration::from_secs(15),
    safety_margin: 3,
};

static BSC: ChainDescriptor = ChainDescriptor {
    chain: Chain::Bsc,
    explorer_url: "https://api.bscscan.com/api",
    native_symbol: "BNB",
    native_asset_id: "binancecoin",
    credential_env: "BSCSCAN_API_KEY",
    default_poll_interval: Duration::from_secs(5),
    safety_margin: 6,
};

static POLYGON: ChainDescriptor = ChainDescriptor {
    chain: Chain::Polygon,
    explorer_url: "https://api.polygonscan.com/api",
    native_symbol: "POL",
    native_asset_id: "polygon-ecosystem-token",
    credential_env: "POLYGONSCAN_API_KEY",
    default_poll_interval: Duration::from_secs(5),
    safety_margin: 12,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_lookup() {
        let desc = Chain::Ethereum.descriptor();
        assert_eq!(desc.chain, Chain::Ethereum);
        assert_eq!(desc.native_symbol, "ETH");
        assert!(desc.explorer_url.starts_with("https://"));
    }

    #[test]
    fn test_from_id_roundtrip() {
        for chain in Chain::ALL {
            assert_eq!(Chain::from_id(chain.id()), Some(*chain));
        }
        assert_eq!(Chain::from_id("dogecoin"), None);
    }

    #[test]
    fn test_every_chain_has_descriptor() {
        for chain in Chain::ALL {
            let desc = chain.descriptor();
            assert_eq!(desc.chain, *chain);
            assert!(!desc.credential_env.is_empty());
            assert!(desc.safety_margin > 0);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Chain::Bsc.to_string(), "bsc");
        assert_eq!(AssetClass::Token.to_string(), "token");
    }
}
