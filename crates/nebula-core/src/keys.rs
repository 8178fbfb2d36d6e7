//! Hierarchical key derivation and ed25519 signing
//!
//! Keys follow SLIP-0010 for ed25519: only hardened steps are defined, and
//! wallets derive account `i` along `m/44'/501'/i'/0'`.
//!
//! Reference: <https://github.com/satoshilabs/slips/blob/master/slip-0010.md>

use crate::address::Pubkey;
use crate::mnemonic::{Mnemonic, Seed};
use crate::{Error, Result};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use nebula_params::SOLANA_COIN_TYPE;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha512;
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroize;

type HmacSha512 = Hmac<Sha512>;

/// Hardened index offset (0x80000000)
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

const MASTER_HMAC_KEY: &[u8] = b"ed25519 seed";

/// Derivation path for wallet account `account_index`
pub fn derivation_path(account_index: u32) -> String {
    format!("m/44'/{}'/{}'/0'", SOLANA_COIN_TYPE, account_index)
}

/// Derive the signing keypair for `account_index` from a recovery phrase
pub fn derive_keypair(mnemonic: &Mnemonic, account_index: u32) -> Result<SigningKeypair> {
    let seed = mnemonic.to_seed()?;
    derive_keypair_from_seed(&seed, &derivation_path(account_index))
}

/// Derive a keypair from a BIP-39 seed along a hardened-only path
pub fn derive_keypair_from_seed(seed: &Seed, path: &str) -> Result<SigningKeypair> {
    let indices = parse_derivation_path(path)?;

    let (mut key, mut chain_code) = split_hmac(MASTER_HMAC_KEY, seed.as_bytes())?;

    for index in indices {
        let mut data = [0u8; 37];
        data[1..33].copy_from_slice(&key);
        data[33..].copy_from_slice(&(index | HARDENED_OFFSET).to_be_bytes());
        let (child_key, child_chain) = split_hmac(&chain_code, &data)?;
        data.zeroize();
        key.zeroize();
        chain_code.zeroize();
        key = child_key;
        chain_code = child_chain;
    }

    let keypair = SigningKeypair::from_secret_bytes(&key);
    key.zeroize();
    chain_code.zeroize();

    tracing::debug!("Derived keypair at {} -> {}", path, keypair.public_key());
    Ok(keypair)
}

fn split_hmac(key: &[u8], data: &[u8]) -> Result<([u8; 32], [u8; 32])> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| Error::KeyDerivation(format!("HMAC-SHA512 init failed: {}", e)))?;
    mac.update(data);
    let mut output = [0u8; 64];
    output.copy_from_slice(&mac.finalize().into_bytes());

    let mut left = [0u8; 32];
    let mut right = [0u8; 32];
    left.copy_from_slice(&output[..32]);
    right.copy_from_slice(&output[32..]);
    output.zeroize();
    Ok((left, right))
}

/// Parse `m/a'/b'/...` into raw indices. Every step must be hardened.
pub fn parse_derivation_path(path: &str) -> Result<Vec<u32>> {
    let mut parts = path.trim().split('/');
    if parts.next() != Some("m") {
        return Err(Error::KeyDerivation(format!(
            "path must start with 'm': {}",
            path
        )));
    }

    let mut indices = Vec::new();
    for part in parts {
        let raw = part
            .strip_suffix('\'')
            .or_else(|| part.strip_suffix('h'))
            .ok_or_else(|| {
                Error::KeyDerivation(format!("non-hardened step '{}' in {}", part, path))
            })?;
        let index: u32 = raw
            .parse()
            .map_err(|_| Error::KeyDerivation(format!("invalid step '{}' in {}", part, path)))?;
        if index >= HARDENED_OFFSET {
            return Err(Error::KeyDerivation(format!(
                "step {} out of range in {}",
                index, path
            )));
        }
        indices.push(index);
    }
    Ok(indices)
}

/// ed25519 signing keypair.
///
/// Not `Clone`; the secret half is wiped when dropped and never printed.
pub struct SigningKeypair {
    signing_key: SigningKey,
}

impl SigningKeypair {
    /// Build from a 32-byte ed25519 secret
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// Public half as an address
    pub fn public_key(&self) -> Pubkey {
        Pubkey::new_from_array(self.signing_key.verifying_key().to_bytes())
    }

    /// Base58 address
    pub fn address(&self) -> String {
        self.public_key().to_string()
    }

    /// Detached signature over `message`
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for SigningKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeypair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Verify a detached signature
pub fn verify(public_key: &Pubkey, message: &[u8], signature: &Signature) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(public_key.as_bytes()) else {
        return false;
    };
    let signature = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
    verifying_key.verify(message, &signature).is_ok()
}

/// Anything able to produce signatures for a single account.
///
/// Implemented by a bare keypair and by the wallet session, which refuses
/// while locked.
pub trait TransactionSigner: Send + Sync {
    /// Address of the signing account
    fn public_key(&self) -> Result<Pubkey>;

    /// Sign raw message bytes
    fn sign_message(&self, message: &[u8]) -> Result<Signature>;
}

impl TransactionSigner for SigningKeypair {
    fn public_key(&self) -> Result<Pubkey> {
        Ok(SigningKeypair::public_key(self))
    }

    fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        Ok(self.sign(message))
    }
}

/// 64-byte ed25519 signature, rendered in base58
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 64]);

impl Signature {
    /// Byte length of a signature
    pub const LEN: usize = 64;

    /// Wrap raw bytes
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Borrow raw bytes
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; 64])
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self)
    }
}

impl FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| Error::Other(format!("invalid signature {}: {}", s, e)))?;
        let array: [u8; 64] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::Other(format!("signature must be 64 bytes: {}", s)))?;
        Ok(Self(array))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mnemonic::MnemonicCodec;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_known_answer_account_0() {
        let mnemonic = MnemonicCodec::parse(ABANDON).unwrap();
        let keypair = derive_keypair(&mnemonic, 0).unwrap();
        assert_eq!(keypair.address(), "HAgk14JpMQLgt6rVgv7cBQFJWFto5Dqxi472uT3DKpqk");
    }

    #[test]
    fn test_known_answer_account_1() {
        let mnemonic = MnemonicCodec::parse(ABANDON).unwrap();
        let keypair = derive_keypair(&mnemonic, 1).unwrap();
        assert_eq!(keypair.address(), "Hh8QwFUA6MtVu1qAoq12ucvFHNwCcVTV7hpWjeY1Hztb");
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let mnemonic = MnemonicCodec::parse(ABANDON).unwrap();
        let a = derive_keypair(&mnemonic, 7).unwrap();
        let b = derive_keypair(&mnemonic, 7).unwrap();
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_slip10_vector_1_master() {
        let seed_bytes = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let (key, chain) = split_hmac(MASTER_HMAC_KEY, &seed_bytes).unwrap();
        assert_eq!(
            hex::encode(key),
            "2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7"
        );
        assert_eq!(
            hex::encode(chain),
            "90046a93de5380a72b5e45010748567d5ea02bbf6522f979e05c0d8d8ca9fffb"
        );
    }

    #[test]
    fn test_path_formatting() {
        assert_eq!(derivation_path(0), "m/44'/501'/0'/0'");
        assert_eq!(derivation_path(12), "m/44'/501'/12'/0'");
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(parse_derivation_path("m/44'/501'/0'/0'").unwrap(), vec![44, 501, 0, 0]);
        assert_eq!(parse_derivation_path("m/44h/501h").unwrap(), vec![44, 501]);
        assert!(parse_derivation_path("m/44'/501/0'").is_err());
        assert!(parse_derivation_path("44'/501'").is_err());
        assert!(parse_derivation_path("m/2147483648'").is_err());
        assert!(parse_derivation_path("m/x'").is_err());
    }

    #[test]
    fn test_sign_and_verify() {
        let mnemonic = MnemonicCodec::parse(ABANDON).unwrap();
        let keypair = derive_keypair(&mnemonic, 0).unwrap();
        let sig = keypair.sign(b"hello nebula");
        assert!(verify(&keypair.public_key(), b"hello nebula", &sig));
        assert!(!verify(&keypair.public_key(), b"hello nebulb", &sig));
    }

    #[test]
    fn test_signature_text_round_trip() {
        let keypair = SigningKeypair::from_secret_bytes(&[9u8; 32]);
        let sig = keypair.sign(b"msg");
        let text = sig.to_string();
        assert_eq!(text.parse::<Signature>().unwrap(), sig);
        assert!("abc".parse::<Signature>().is_err());
    }

    #[test]
    fn test_debug_hides_secret() {
        let keypair = SigningKeypair::from_secret_bytes(&[9u8; 32]);
        let debug = format!("{:?}", keypair);
        assert!(debug.contains(&keypair.address()));
        assert!(!debug.contains("signing_key"));
    }
}
