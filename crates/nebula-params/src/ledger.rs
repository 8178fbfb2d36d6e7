//! Ledger-wide constants and limits

use crate::network::{Network, NetworkType};

/// Lamports in one SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Decimal places of the native asset
pub const SOL_DECIMALS: u8 = 9;

/// Fee charged per signature when the cluster cannot be asked (lamports)
pub const DEFAULT_SIGNATURE_FEE_LAMPORTS: u64 = 5_000;

/// Maximum serialized transaction size accepted by the cluster (bytes)
pub const MAX_TRANSACTION_SIZE: usize = 1232;

/// Ledger parameters
#[derive(Debug, Clone)]
pub struct LedgerParams {
    /// Network configuration
    pub network: Network,
    /// Target slot time in milliseconds
    pub slot_time_ms: u64,
    /// Number of blocks a recent blockhash stays valid
    pub max_blockhash_age: u64,
    /// Fee per signature (lamports)
    pub lamports_per_signature: u64,
}

impl LedgerParams {
    /// Create ledger params for mainnet-beta
    pub fn mainnet() -> Self {
        Self::from_network(NetworkType::Mainnet)
    }

    /// Create ledger params for devnet
    pub fn devnet() -> Self {
        Self::from_network(NetworkType::Devnet)
    }

    /// Get ledger params by network type
    pub fn from_network(network_type: NetworkType) -> Self {
        Self {
            network: Network::from_type(network_type),
            slot_time_ms: 400,
            max_blockhash_age: 150,
            lamports_per_signature: DEFAULT_SIGNATURE_FEE_LAMPORTS,
        }
    }

    /// Base fee for a transaction carrying `signatures` signatures
    pub fn base_fee(&self, signatures: u64) -> u64 {
        self.lamports_per_signature.saturating_mul(signatures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_fee() {
        let params = LedgerParams::mainnet();
        assert_eq!(params.base_fee(1), 5_000);
        assert_eq!(params.base_fee(2), 10_000);
        assert_eq!(params.base_fee(u64::MAX), u64::MAX);
    }

    #[test]
    fn test_from_network() {
        let params = LedgerParams::devnet();
        assert_eq!(params.network.network_type, NetworkType::Devnet);
        assert_eq!(params.max_blockhash_age, 150);
    }
}
