//! Nebula wallet core
//!
//! This crate implements the custody primitives of the wallet: recovery
//! phrase handling, SLIP-0010 key derivation, addresses, instruction and
//! transaction encoding, fee policy and the shared error taxonomy.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod address;
pub mod amount;
pub mod error;
pub mod fees;
pub mod instruction;
pub mod keys;
pub mod mnemonic;
pub mod random;
pub mod transaction;

pub use address::{
    associated_token_address, is_valid_address, parse_address, Pubkey,
    ASSOCIATED_TOKEN_PROGRAM_ID, COMPUTE_BUDGET_PROGRAM_ID, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
pub use amount::{format_sol, format_ui_amount, lamports_to_sol, parse_sol, parse_ui_amount};
pub use error::{Error, ErrorCategory, Result};
pub use fees::{FeeCalculator, DEFAULT_COMPUTE_UNIT_LIMIT, FALLBACK_FEE, MAX_PRIORITY_FEE_MICRO_LAMPORTS};
pub use instruction::{AccountMeta, Instruction};
pub use keys::{
    derivation_path, derive_keypair, verify, Signature, SigningKeypair, TransactionSigner,
};
pub use mnemonic::{Mnemonic, MnemonicCodec, MnemonicStrength, Seed};
pub use random::{OsRandom, RandomSource};
pub use transaction::{Hash, Message, Transaction};
