//! Encrypted wallet vault and session custody for Nebula Wallet
//!
//! Recovery phrases are sealed at rest with AES-256-GCM under a
//! PBKDF2-HMAC-SHA256 password key and stored as a JSON collection behind a
//! pluggable repository. The decrypted signing key only lives inside a
//! [`SessionGuard`], which locks itself after a period of inactivity.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod repository;
pub mod security;
pub mod session;
pub mod wallet_store;

pub use error::{Error, Result};
pub use models::{VaultEntry, VaultEntrySummary};
pub use repository::{
    default_data_dir, InMemoryVaultRepository, JsonFileVaultRepository, VaultRepository,
    VAULT_FILE_NAME,
};
pub use security::{
    EncryptedSecret, SecretCipher, VaultCipher, DEFAULT_PBKDF2_ITERATIONS, MIN_PBKDF2_ITERATIONS,
};
pub use session::{SessionGuard, SessionStatus, DEFAULT_INACTIVITY_TIMEOUT};
pub use wallet_store::{WalletVaultStore, DEFAULT_WALLET_NAME};
