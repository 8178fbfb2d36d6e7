//! Request and result types of the wallet service

use nebula_core::{Mnemonic, Signature};
use nebula_vault::VaultEntrySummary;
use serde::{Deserialize, Serialize};

/// A newly created wallet and the phrase to show the user once
#[derive(Debug)]
pub struct CreatedWallet {
    /// Stored wallet
    pub wallet: VaultEntrySummary,
    /// Recovery phrase
    pub mnemonic: Mnemonic,
}

/// Native transfer as entered by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeTransfer {
    /// Destination address (base58)
    pub to_address: String,
    /// Amount in SOL, e.g. `"1.25"`
    pub amount: String,
    /// Optional priority fee in micro-lamports per compute unit
    pub priority_fee_micro_lamports: Option<u64>,
}

/// Token transfer as entered by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransfer {
    /// Destination wallet address (base58)
    pub to_address: String,
    /// Mint address (base58)
    pub mint: String,
    /// Amount in token units, e.g. `"12.5"`
    pub amount: String,
    /// Mint decimals
    pub decimals: u8,
}

/// Outcome of a confirmed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Transaction signature
    pub signature: Signature,
    /// Whether the destination existed before the transfer.
    /// `None` when the check itself failed.
    pub recipient_existed: Option<bool>,
}
