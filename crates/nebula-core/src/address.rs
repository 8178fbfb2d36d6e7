//! Account addresses
//!
//! An address is a 32-byte ed25519 public key rendered in base58. Program
//! derived addresses (PDAs) are hashes that deliberately fall off the curve.

use crate::{Error, Result};
use curve25519_dalek::edwards::CompressedEdwardsY;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Maximum number of seeds in a program address derivation
pub const MAX_SEEDS: usize = 16;

/// Maximum length of a single seed
pub const MAX_SEED_LEN: usize = 32;

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// `11111111111111111111111111111111`
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new_from_array([0u8; 32]);

/// `ComputeBudget111111111111111111111111111111`
pub const COMPUTE_BUDGET_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    3, 6, 70, 111, 229, 33, 23, 50, 255, 236, 173, 186, 114, 195, 155, 231, 188, 140, 229, 187,
    197, 247, 18, 107, 44, 67, 155, 58, 64, 0, 0, 0,
]);

/// `TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`
pub const TOKEN_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    6, 221, 246, 225, 215, 101, 161, 147, 217, 203, 225, 70, 206, 235, 121, 172, 28, 180, 133,
    237, 95, 91, 55, 145, 58, 140, 245, 133, 126, 255, 0, 169,
]);

/// `ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL`
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    140, 151, 37, 143, 78, 36, 137, 241, 187, 61, 16, 41, 20, 142, 13, 131, 11, 90, 19, 153, 218,
    255, 16, 132, 4, 142, 123, 216, 219, 233, 248, 89,
]);

/// 32-byte account address
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pubkey([u8; 32]);

impl Pubkey {
    /// Byte length of an address
    pub const LEN: usize = 32;

    /// Wrap raw bytes
    pub const fn new_from_array(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Build from a slice of exactly 32 bytes
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            Error::InvalidAddress(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(array))
    }

    /// Raw bytes
    pub const fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Borrow raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether the bytes decompress to a point on the ed25519 curve
    pub fn is_on_curve(&self) -> bool {
        CompressedEdwardsY(self.0).decompress().is_some()
    }

    /// Derive a program address from seeds and a bump already appended
    pub fn create_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Result<Pubkey> {
        if seeds.len() > MAX_SEEDS {
            return Err(Error::InvalidAddress(format!(
                "too many seeds: {} (max {})",
                seeds.len(),
                MAX_SEEDS
            )));
        }
        if let Some(seed) = seeds.iter().find(|s| s.len() > MAX_SEED_LEN) {
            return Err(Error::InvalidAddress(format!(
                "seed of {} bytes exceeds {}",
                seed.len(),
                MAX_SEED_LEN
            )));
        }

        let mut hasher = Sha256::new();
        for seed in seeds {
            hasher.update(seed);
        }
        hasher.update(program_id.as_bytes());
        hasher.update(PDA_MARKER);
        let candidate = Pubkey(hasher.finalize().into());

        if candidate.is_on_curve() {
            return Err(Error::InvalidAddress(
                "derived address lies on the ed25519 curve".to_string(),
            ));
        }
        Ok(candidate)
    }

    /// Find the highest bump seed producing a valid program address
    pub fn find_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Result<(Pubkey, u8)> {
        for bump in (0..=u8::MAX).rev() {
            let bump_seed = [bump];
            let mut with_bump: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 1);
            with_bump.extend_from_slice(seeds);
            with_bump.push(&bump_seed);
            match Self::create_program_address(&with_bump, program_id) {
                Ok(address) => return Ok((address, bump)),
                Err(_) if seeds.len() < MAX_SEEDS => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::InvalidAddress(
            "no viable bump seed for program address".to_string(),
        ))
    }
}

/// Associated token account holding `mint` for `owner`
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Result<Pubkey> {
    let (address, _bump) = Pubkey::find_program_address(
        &[owner.as_bytes(), TOKEN_PROGRAM_ID.as_bytes(), mint.as_bytes()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )?;
    Ok(address)
}

/// Parse a base58 address
pub fn parse_address(input: &str) -> Result<Pubkey> {
    input.parse()
}

/// Check whether `input` is a valid base58 address
pub fn is_valid_address(input: &str) -> bool {
    parse_address(input).is_ok()
}

impl FromStr for Pubkey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.len() > 44 {
            return Err(Error::InvalidAddress(s.to_string()));
        }
        let bytes = bs58::decode(trimmed)
            .into_vec()
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", s, e)))?;
        Self::try_from_slice(&bytes).map_err(|_| Error::InvalidAddress(s.to_string()))
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self)
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
