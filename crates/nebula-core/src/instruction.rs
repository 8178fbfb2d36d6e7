//! Program instructions used by the wallet
//!
//! Only the handful of system, compute-budget and token instructions the
//! wallet submits are encoded here.

use crate::address::{
    Pubkey, ASSOCIATED_TOKEN_PROGRAM_ID, COMPUTE_BUDGET_PROGRAM_ID, SYSTEM_PROGRAM_ID,
    TOKEN_PROGRAM_ID,
};

/// Account reference inside an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMeta {
    /// Account address
    pub pubkey: Pubkey,
    /// Whether the account must sign
    pub is_signer: bool,
    /// Whether the instruction may modify the account
    pub is_writable: bool,
}

impl AccountMeta {
    /// Writable account
    pub const fn new(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    /// Read-only account
    pub const fn new_readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// A single program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Program to invoke
    pub program_id: Pubkey,
    /// Accounts in program-defined order
    pub accounts: Vec<AccountMeta>,
    /// Opaque instruction data
    pub data: Vec<u8>,
}

/// System program transfer of `lamports` from `from` to `to`
pub fn system_transfer(from: &Pubkey, to: &Pubkey, lamports: u64) -> Instruction {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&2u32.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![AccountMeta::new(*from, true), AccountMeta::new(*to, false)],
        data,
    }
}

/// Compute-budget priority fee, in micro-lamports per compute unit
pub fn set_compute_unit_price(micro_lamports: u64) -> Instruction {
    let mut data = Vec::with_capacity(9);
    data.push(3);
    data.extend_from_slice(&micro_lamports.to_le_bytes());
    Instruction {
        program_id: COMPUTE_BUDGET_PROGRAM_ID,
        accounts: Vec::new(),
        data,
    }
}

/// SPL token `TransferChecked` of `amount` base units between token accounts.
///
/// The token program rejects the transfer if `mint` or `decimals` do not
/// match the source account.
pub fn token_transfer_checked(
    source: &Pubkey,
    mint: &Pubkey,
    destination: &Pubkey,
    owner: &Pubkey,
    amount: u64,
    decimals: u8,
) -> Instruction {
    let mut data = Vec::with_capacity(10);
    data.push(12);
    data.extend_from_slice(&amount.to_le_bytes());
    data.push(decimals);
    Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*source, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*owner, true),
        ],
        data,
    }
}

/// Create the associated token account for `owner`/`mint`, paid by `payer`.
///
/// Uses the idempotent variant so a concurrent creation does not fail the
/// whole transfer.
pub fn create_associated_token_account(
    payer: &Pubkey,
    associated_account: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(*associated_account, false),
            AccountMeta::new_readonly(*owner, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        ],
        data: vec![1],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> Pubkey {
        Pubkey::new_from_array([byte; 32])
    }

    #[test]
    fn test_system_transfer_layout() {
        let ix = system_transfer(&key(1), &key(2), 1_500_000_000);
        assert_eq!(ix.program_id, SYSTEM_PROGRAM_ID);
        assert_eq!(ix.data.len(), 12);
        assert_eq!(&ix.data[..4], &[2, 0, 0, 0]);
        assert_eq!(u64::from_le_bytes(ix.data[4..].try_into().unwrap()), 1_500_000_000);
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert!(!ix.accounts[1].is_signer && ix.accounts[1].is_writable);
    }

    #[test]
    fn test_compute_unit_price_layout() {
        let ix = set_compute_unit_price(10_000);
        assert_eq!(ix.program_id, COMPUTE_BUDGET_PROGRAM_ID);
        assert!(ix.accounts.is_empty());
        assert_eq!(ix.data[0], 3);
        assert_eq!(u64::from_le_bytes(ix.data[1..].try_into().unwrap()), 10_000);
    }

    #[test]
    fn test_token_transfer_checked_layout() {
        let ix = token_transfer_checked(&key(1), &key(4), &key(2), &key(3), 42, 6);
        assert_eq!(ix.program_id, TOKEN_PROGRAM_ID);
        assert_eq!(ix.data, vec![12, 42, 0, 0, 0, 0, 0, 0, 0, 6]);
        assert_eq!(ix.accounts[1], AccountMeta::new_readonly(key(4), false));
        assert_eq!(ix.accounts[3], AccountMeta::new_readonly(key(3), true));
    }

    #[test]
    fn test_create_ata_layout() {
        let ix = create_associated_token_account(&key(1), &key(2), &key(3), &key(4));
        assert_eq!(ix.program_id, ASSOCIATED_TOKEN_PROGRAM_ID);
        assert_eq!(ix.accounts.len(), 6);
        assert_eq!(ix.data, vec![1]);
        assert!(ix.accounts[0].is_signer);
        assert_eq!(ix.accounts[5].pubkey, TOKEN_PROGRAM_ID);
    }
}
