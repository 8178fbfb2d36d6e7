//! Nebula wallet network parameters and constants
//!
//! This crate provides the cluster profiles the wallet can talk to, the
//! BIP-44 coin type, unit conversion constants and ledger limits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod ledger;
pub mod network;

pub use ledger::{
    LedgerParams, DEFAULT_SIGNATURE_FEE_LAMPORTS, LAMPORTS_PER_SOL, MAX_TRANSACTION_SIZE,
    SOL_DECIMALS,
};
pub use network::{Network, NetworkType, SOLANA_COIN_TYPE};

/// Error types for parameter operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid network specified
    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    /// Invalid RPC endpoint
    #[error("Invalid RPC endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Result type for parameter operations
pub type Result<T> = std::result::Result<T, Error>;
