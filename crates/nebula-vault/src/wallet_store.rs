//! Encrypted wallet collection
//!
//! Each wallet is its recovery phrase sealed under the user's password,
//! keyed by the account-0 address. Plaintext phrases only leave the store
//! through [`WalletVaultStore::unlock_mnemonic`].

use crate::models::{VaultEntry, VaultEntrySummary};
use crate::repository::VaultRepository;
use crate::security::SecretCipher;
use chrono::Utc;
use nebula_core::random::{random_array, RandomSource};
use nebula_core::{derive_keypair, Error, Mnemonic, MnemonicCodec, Pubkey, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

/// Name used when the caller supplies none
pub const DEFAULT_WALLET_NAME: &str = "Default Wallet";

/// Maximum display name length (characters)
pub const MAX_WALLET_NAME_LENGTH: usize = 64;

/// Wallet vault
pub struct WalletVaultStore {
    repository: Arc<dyn VaultRepository>,
    cipher: Arc<dyn SecretCipher>,
    rng: Arc<dyn RandomSource>,
    write_lock: Mutex<()>,
}

impl WalletVaultStore {
    /// Store over `repository`, sealing with `cipher`
    pub fn new(
        repository: Arc<dyn VaultRepository>,
        cipher: Arc<dyn SecretCipher>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            repository,
            cipher,
            rng,
            write_lock: Mutex::new(()),
        }
    }

    /// Seal `mnemonic` under `password` and add it to the vault
    pub fn create(&self, mnemonic: &Mnemonic, password: &str, name: &str) -> Result<VaultEntrySummary> {
        if !MnemonicCodec::validate(mnemonic.phrase()) {
            return Err(Error::InvalidMnemonic("checksum mismatch".to_string()));
        }
        if password.is_empty() {
            return Err(Error::InvalidPassword("password must not be empty".to_string()));
        }
        let name = normalize_name(name)?;
        let public_key = derive_keypair(mnemonic, 0)?.public_key();

        let _guard = self.write_lock.lock();
        if self.repository.get(&public_key)?.is_some() {
            return Err(Error::WalletAlreadyExists(public_key.to_string()));
        }

        let sealed = self.cipher.encrypt(mnemonic.phrase().as_bytes(), password)?;
        let entry = VaultEntry {
            id: self.new_id()?,
            name,
            public_key,
            encrypted_mnemonic: sealed.to_base64(),
            created_at: Utc::now(),
        };
        let summary = entry.summary();
        self.repository.put(entry)?;

        info!("Stored wallet {} ({})", summary.name, public_key);
        Ok(summary)
    }

    /// Validate a user-supplied phrase, then [`Self::create`]
    pub fn import(&self, phrase: &str, password: &str, name: &str) -> Result<VaultEntrySummary> {
        let mnemonic = MnemonicCodec::parse(phrase)?;
        self.create(&mnemonic, password, name)
    }

    /// Public listing, without sealed blobs
    pub fn list(&self) -> Result<Vec<VaultEntrySummary>> {
        Ok(self
            .repository
            .list()?
            .iter()
            .map(VaultEntry::summary)
            .collect())
    }

    /// Whether a wallet exists for `public_key`
    pub fn contains(&self, public_key: &Pubkey) -> Result<bool> {
        Ok(self.repository.get(public_key)?.is_some())
    }

    /// Delete the wallet for `public_key`. Absent keys are a no-op.
    pub fn remove(&self, public_key: &Pubkey) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let removed = self.repository.delete(public_key)?;
        if removed {
            info!("Removed wallet {}", public_key);
        }
        Ok(removed)
    }

    /// Decrypt the phrase for `public_key`.
    ///
    /// Wrong passwords, corrupt blobs and payloads that are not valid
    /// phrases all surface as [`Error::DecryptionFailed`].
    pub fn unlock_mnemonic(&self, public_key: &Pubkey, password: &str) -> Result<Mnemonic> {
        let entry = self
            .repository
            .get(public_key)?
            .ok_or_else(|| Error::WalletNotFound(public_key.to_string()))?;

        let sealed = entry.encrypted_secret()?;
        let plaintext = self.cipher.decrypt(&sealed, password).map_err(|e| {
            warn!("Failed to unlock wallet {}", public_key);
            e
        })?;
        let phrase = std::str::from_utf8(&plaintext).map_err(|_| Error::DecryptionFailed)?;
        MnemonicCodec::parse(phrase).map_err(|_| Error::DecryptionFailed)
    }

    fn new_id(&self) -> Result<String> {
        let bytes: [u8; 16] = random_array(self.rng.as_ref())?;
        Ok(uuid::Builder::from_random_bytes(bytes).into_uuid().to_string())
    }
}

fn normalize_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Ok(DEFAULT_WALLET_NAME.to_string());
    }
    if trimmed.chars().count() > MAX_WALLET_NAME_LENGTH {
        return Err(Error::InvalidWalletName(format!(
            "longer than {} characters",
            MAX_WALLET_NAME_LENGTH
        )));
    }
    Ok(trimmed.to_string())
}
