//! Ledger access for Nebula Wallet
//!
//! [`LedgerRpc`] is the JSON-RPC port, [`HttpRpcClient`] its HTTP adapter and
//! [`LedgerGateway`] the wallet-facing service that queries balances, quotes
//! fees and submits signed transfers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod gateway;
#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;

pub use client::{
    AccountInfo, Commitment, HttpConnector, HttpRpcClient, LatestBlockhash, LedgerRpc, RpcConfig,
    RpcConnector, SignatureInfo, SignatureStatus, SimulationResult, TokenAccount, TransactionMeta,
};
pub use error::{Error, Result};
pub use gateway::{
    GatewayConfig, LedgerGateway, SimulationOutcome, TokenBalance, TokenTransferRequest,
    TransactionRecord, TransferRequest, MAX_HISTORY_LIMIT,
};
