//! Nebula wallet service
//!
//! Collaborator-facing facade over the vault, the session and the ledger
//! gateway. Front ends call [`WalletService`] and get every failure as a
//! tagged [`nebula_core::Error`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod models;
pub mod service;

pub use config::ServiceConfig;
pub use models::{CreatedWallet, NativeTransfer, TokenTransfer, TransferReceipt};
pub use service::WalletService;
