//! Cluster profiles

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// BIP-44 coin type registered for Solana
pub const SOLANA_COIN_TYPE: u32 = 501;

/// Network type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NetworkType {
    /// Production cluster
    #[serde(rename = "mainnet-beta")]
    Mainnet,
    /// Public test cluster
    #[serde(rename = "testnet")]
    Testnet,
    /// Development cluster
    #[default]
    #[serde(rename = "devnet")]
    Devnet,
}

impl NetworkType {
    /// Cluster slug as used by RPC providers and explorers
    pub const fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Mainnet => "mainnet-beta",
            NetworkType::Testnet => "testnet",
            NetworkType::Devnet => "devnet",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "mainnet-beta" => Ok(NetworkType::Mainnet),
            "testnet" => Ok(NetworkType::Testnet),
            "devnet" => Ok(NetworkType::Devnet),
            other => Err(Error::InvalidNetwork(other.to_string())),
        }
    }
}

/// Network configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    /// Network type
    pub network_type: NetworkType,
    /// Human-readable name
    pub name: &'static str,
    /// JSON-RPC endpoint
    pub rpc_url: Cow<'static, str>,
    /// Coin type (BIP-44)
    pub coin_type: u32,
    /// Whether this cluster moves real value
    pub is_production: bool,
}

impl Network {
    /// Get mainnet-beta parameters
    pub const fn mainnet() -> Self {
        Self {
            network_type: NetworkType::Mainnet,
            name: "Mainnet Beta",
            rpc_url: Cow::Borrowed("https://api.mainnet-beta.solana.com"),
            coin_type: SOLANA_COIN_TYPE,
            is_production: true,
        }
    }

    /// Get testnet parameters
    pub const fn testnet() -> Self {
        Self {
            network_type: NetworkType::Testnet,
            name: "Testnet",
            rpc_url: Cow::Borrowed("https://api.testnet.solana.com"),
            coin_type: SOLANA_COIN_TYPE,
            is_production: false,
        }
    }

    /// Get devnet parameters
    pub const fn devnet() -> Self {
        Self {
            network_type: NetworkType::Devnet,
            name: "Devnet",
            rpc_url: Cow::Borrowed("https://api.devnet.solana.com"),
            coin_type: SOLANA_COIN_TYPE,
            is_production: false,
        }
    }

    /// Get network by type
    pub const fn from_type(network_type: NetworkType) -> Self {
        match network_type {
            NetworkType::Mainnet => Self::mainnet(),
            NetworkType::Testnet => Self::testnet(),
            NetworkType::Devnet => Self::devnet(),
        }
    }

    /// Replace the RPC endpoint with a custom one.
    ///
    /// Only `http` and `https` URLs are accepted.
    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let trimmed = url.trim();
        let has_host = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .map(|rest| !rest.is_empty())
            .unwrap_or(false);
        if !has_host {
            return Err(Error::InvalidEndpoint(url));
        }
        self.rpc_url = Cow::Owned(trimmed.trim_end_matches('/').to_string());
        Ok(self)
    }

    /// Faucet airdrops are only served by non-production clusters
    pub const fn allows_airdrop(&self) -> bool {
        !self.is_production
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::devnet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainnet_params() {
        let net = Network::mainnet();
        assert_eq!(net.network_type, NetworkType::Mainnet);
        assert_eq!(net.coin_type, 501);
        assert!(net.is_production);
        assert!(!net.allows_airdrop());
        assert_eq!(net.rpc_url, "https://api.mainnet-beta.solana.com");
    }

    #[test]
    fn test_network_from_type() {
        let net = Network::from_type(NetworkType::Testnet);
        assert_eq!(net.network_type, NetworkType::Testnet);
        assert!(net.allows_airdrop());
    }

    #[test]
    fn test_default_is_devnet() {
        assert_eq!(Network::default().network_type, NetworkType::Devnet);
        assert_eq!(NetworkType::default(), NetworkType::Devnet);
    }

    #[test]
    fn test_parse_network_type() {
        assert_eq!("mainnet-beta".parse::<NetworkType>().unwrap(), NetworkType::Mainnet);
        assert_eq!("Mainnet".parse::<NetworkType>().unwrap(), NetworkType::Mainnet);
        assert_eq!(" devnet ".parse::<NetworkType>().unwrap(), NetworkType::Devnet);
        assert!("localnet".parse::<NetworkType>().is_err());
    }

    #[test]
    fn test_serde_uses_cluster_slug() {
        let json = serde_json::to_string(&NetworkType::Mainnet).unwrap();
        assert_eq!(json, "\"mainnet-beta\"");
        let back: NetworkType = serde_json::from_str("\"testnet\"").unwrap();
        assert_eq!(back, NetworkType::Testnet);
    }

    #[test]
    fn test_custom_endpoint() {
        let net = Network::devnet()
            .with_rpc_url("http://127.0.0.1:8899/")
            .unwrap();
        assert_eq!(net.rpc_url, "http://127.0.0.1:8899");
        assert_eq!(net.network_type, NetworkType::Devnet);

        assert!(Network::devnet().with_rpc_url("ftp://example.com").is_err());
        assert!(Network::devnet().with_rpc_url("https://").is_err());
    }
}
