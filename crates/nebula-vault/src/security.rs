//! Password-based encryption of vault secrets
//!
//! Secrets are sealed with AES-256-GCM under a key stretched from the user's
//! password with PBKDF2-HMAC-SHA256. Every call draws a fresh salt and nonce.
//!
//! Blob layout: `[salt(16)][nonce(12)][ciphertext][tag(16)]`, base64 on disk.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::Engine;
use nebula_core::random::{random_array, RandomSource};
use nebula_core::{Error, Result};
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Salt length in bytes
pub const SALT_LEN: usize = 16;
/// AES-GCM nonce length in bytes
pub const NONCE_LEN: usize = 12;
/// AES-GCM tag length in bytes
pub const TAG_LEN: usize = 16;
/// Derived key length in bytes
pub const KEY_LEN: usize = 32;
/// PBKDF2 rounds used for new secrets
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;
/// Lowest PBKDF2 round count accepted by [`VaultCipher::with_iterations`]
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

const HEADER_LEN: usize = SALT_LEN + NONCE_LEN;

/// Sealed secret: salt, nonce and authenticated ciphertext
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedSecret(Vec<u8>);

impl EncryptedSecret {
    /// Wrap raw blob bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Decode the stored base64 form
    pub fn from_base64(encoded: &str) -> Result<Self> {
        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map(Self)
            .map_err(|_| Error::DecryptionFailed)
    }

    /// Base64 form for storage
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.0)
    }

    /// Raw blob bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Long enough to hold salt, nonce and tag
    pub fn is_well_formed(&self) -> bool {
        self.0.len() >= HEADER_LEN + TAG_LEN
    }

    /// Salt prefix
    pub fn salt(&self) -> Option<&[u8]> {
        self.0.get(..SALT_LEN)
    }

    /// Nonce following the salt
    pub fn nonce(&self) -> Option<&[u8]> {
        self.0.get(SALT_LEN..HEADER_LEN)
    }

    /// Ciphertext and tag
    pub fn ciphertext(&self) -> Option<&[u8]> {
        self.0.get(HEADER_LEN..)
    }
}

impl fmt::Debug for EncryptedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedSecret({} bytes)", self.0.len())
    }
}

/// AEAD plus password KDF capability
pub trait SecretCipher: Send + Sync {
    /// Seal `plaintext` under `password`
    fn encrypt(&self, plaintext: &[u8], password: &str) -> Result<EncryptedSecret>;

    /// Open a sealed secret. Any failure is [`Error::DecryptionFailed`].
    fn decrypt(&self, secret: &EncryptedSecret, password: &str) -> Result<Zeroizing<Vec<u8>>>;
}

/// PBKDF2-HMAC-SHA256 + AES-256-GCM cipher
#[derive(Clone)]
pub struct VaultCipher {
    rng: Arc<dyn RandomSource>,
    iterations: u32,
}

impl VaultCipher {
    /// Cipher with the default round count
    pub fn new(rng: Arc<dyn RandomSource>) -> Self {
        Self {
            rng,
            iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }

    /// Cipher with a custom round count, never below the minimum
    pub fn with_iterations(rng: Arc<dyn RandomSource>, iterations: u32) -> Result<Self> {
        if iterations < MIN_PBKDF2_ITERATIONS {
            return Err(Error::Config(format!(
                "PBKDF2 iterations {} below minimum {}",
                iterations, MIN_PBKDF2_ITERATIONS
            )));
        }
        Ok(Self { rng, iterations })
    }

    /// Cipher with an arbitrary round count, for fast tests only
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn insecure_for_tests(rng: Arc<dyn RandomSource>, iterations: u32) -> Self {
        Self { rng, iterations }
    }

    /// Configured round count
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    fn derive_key(&self, password: &str, salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, self.iterations, &mut key[..]);
        key
    }
}

impl SecretCipher for VaultCipher {
    fn encrypt(&self, plaintext: &[u8], password: &str) -> Result<EncryptedSecret> {
        if password.is_empty() {
            return Err(Error::InvalidPassword("password must not be empty".to_string()));
        }

        let salt: [u8; SALT_LEN] = random_array(self.rng.as_ref())?;
        let nonce_bytes: [u8; NONCE_LEN] = random_array(self.rng.as_ref())?;

        let key = self.derive_key(password, &salt);
        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| Error::Other(format!("cipher init failed: {}", e)))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| Error::Other(format!("encryption failed: {}", e)))?;

        let mut blob = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(EncryptedSecret(blob))
    }

    fn decrypt(&self, secret: &EncryptedSecret, password: &str) -> Result<Zeroizing<Vec<u8>>> {
        if !secret.is_well_formed() {
            return Err(Error::DecryptionFailed);
        }
        let (header, ciphertext) = secret.0.split_at(HEADER_LEN);
        let (salt, nonce_bytes) = header.split_at(SALT_LEN);

        let key = self.derive_key(password, salt);
        let cipher = Aes256Gcm::new_from_slice(&key[..]).map_err(|_| Error::DecryptionFailed)?;
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| Error::DecryptionFailed)
    }
}

impl fmt::Debug for VaultCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultCipher")
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_core::random::{FailingRandom, OsRandom, SeededRandom};

    fn fast_cipher() -> VaultCipher {
        VaultCipher::insecure_for_tests(Arc::new(OsRandom), 1_000)
    }

    #[test]
    fn test_round_trip_default_iterations() {
        let cipher = VaultCipher::new(Arc::new(OsRandom));
        assert_eq!(cipher.iterations(), 100_000);
        let sealed = cipher.encrypt(b"secret words", "Str0ngPass!23").unwrap();
        let opened = cipher.decrypt(&sealed, "Str0ngPass!23").unwrap();
        assert_eq!(opened.as_slice(), b"secret words");
    }

    #[test]
    fn test_blob_layout() {
        let sealed = fast_cipher().encrypt(b"abc", "pw").unwrap();
        assert_eq!(sealed.as_bytes().len(), SALT_LEN + NONCE_LEN + 3 + TAG_LEN);
        assert_eq!(sealed.salt().unwrap().len(), SALT_LEN);
        assert_eq!(sealed.nonce().unwrap().len(), NONCE_LEN);
        assert_eq!(sealed.ciphertext().unwrap().len(), 3 + TAG_LEN);
    }

    #[test]
    fn test_fresh_salt_and_nonce_per_call() {
        let cipher = fast_cipher();
        let a = cipher.encrypt(b"same", "pw").unwrap();
        let b = cipher.encrypt(b"same", "pw").unwrap();
        assert_ne!(a.salt(), b.salt());
        assert_ne!(a.nonce(), b.nonce());
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_password_fails() {
        let cipher = fast_cipher();
        let sealed = cipher.encrypt(b"data", "right").unwrap();
        assert!(matches!(cipher.decrypt(&sealed, "wrong"), Err(Error::DecryptionFailed)));
    }

    #[test]
    fn test_tampering_fails() {
        let cipher = fast_cipher();
        let sealed = cipher.encrypt(b"data", "pw").unwrap();
        for i in 0..sealed.as_bytes().len() {
            let mut bytes = sealed.as_bytes().to_vec();
            bytes[i] ^= 0x01;
            let tampered = EncryptedSecret::from_bytes(bytes);
            assert!(
                matches!(cipher.decrypt(&tampered, "pw"), Err(Error::DecryptionFailed)),
                "flip at byte {} was accepted",
                i
            );
        }
    }

    #[test]
    fn test_truncated_blob_fails() {
        let cipher = fast_cipher();
        let sealed = cipher.encrypt(b"data", "pw").unwrap();
        let short = EncryptedSecret::from_bytes(sealed.as_bytes()[..HEADER_LEN + TAG_LEN - 1].to_vec());
        assert!(!short.is_well_formed());
        assert!(matches!(cipher.decrypt(&short, "pw"), Err(Error::DecryptionFailed)));
    }

    #[test]
    fn test_bad_base64_is_decryption_failure() {
        assert!(matches!(
            EncryptedSecret::from_base64("%%%not base64%%%"),
            Err(Error::DecryptionFailed)
        ));
    }

    #[test]
    fn test_base64_round_trip() {
        let sealed = fast_cipher().encrypt(b"data", "pw").unwrap();
        let text = sealed.to_base64();
        assert_eq!(EncryptedSecret::from_base64(&text).unwrap(), sealed);
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(matches!(
            fast_cipher().encrypt(b"data", ""),
            Err(Error::InvalidPassword(_))
        ));
    }

    #[test]
    fn test_iteration_floor() {
        assert!(VaultCipher::with_iterations(Arc::new(OsRandom), 99_999).is_err());
        assert!(VaultCipher::with_iterations(Arc::new(OsRandom), 200_000).is_ok());
    }

    #[test]
    fn test_rng_failure_propagates() {
        let cipher = VaultCipher::insecure_for_tests(Arc::new(FailingRandom), 1_000);
        assert!(matches!(cipher.encrypt(b"data", "pw"), Err(Error::Randomness(_))));
    }

    #[test]
    fn test_deterministic_with_seeded_rng() {
        let a = VaultCipher::insecure_for_tests(Arc::new(SeededRandom::new(1)), 1_000)
            .encrypt(b"data", "pw")
            .unwrap();
        let b = VaultCipher::insecure_for_tests(Arc::new(SeededRandom::new(1)), 1_000)
            .encrypt(b"data", "pw")
            .unwrap();
        assert_eq!(a, b);
    }
}
