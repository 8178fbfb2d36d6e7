//! BIP-39 recovery phrases
//!
//! Phrases are generated from an injected [`RandomSource`], validated against
//! the English word list and checksum, and held in zeroizing buffers.

use crate::random::{RandomSource, random_array};
use crate::{Error, Result};
use bip39::Language;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Entropy size of a new phrase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MnemonicStrength {
    /// 128 bits, 12 words
    #[default]
    Words12,
    /// 256 bits, 24 words
    Words24,
}

impl MnemonicStrength {
    /// Map an entropy size in bits to a strength
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            128 => Ok(Self::Words12),
            256 => Ok(Self::Words24),
            other => Err(Error::InvalidMnemonic(format!(
                "unsupported entropy strength {} bits (expected 128 or 256)",
                other
            ))),
        }
    }

    /// Entropy size in bits
    pub const fn bits(&self) -> u32 {
        match self {
            Self::Words12 => 128,
            Self::Words24 => 256,
        }
    }

    /// Number of words in the encoded phrase
    pub const fn word_count(&self) -> usize {
        match self {
            Self::Words12 => 12,
            Self::Words24 => 24,
        }
    }
}

/// A validated recovery phrase.
///
/// The phrase is stored normalised (lower-case, single spaces) and wiped on
/// drop. `Debug` never prints the words.
pub struct Mnemonic {
    phrase: Zeroizing<String>,
    word_count: usize,
}

impl Mnemonic {
    /// The normalised phrase
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    /// Number of words
    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// BIP-39 seed with an empty passphrase
    pub fn to_seed(&self) -> Result<Seed> {
        let parsed = bip39::Mnemonic::parse_in_normalized(Language::English, &self.phrase)
            .map_err(|e| Error::InvalidMnemonic(e.to_string()))?;
        Ok(Seed(Zeroizing::new(parsed.to_seed_normalized(""))))
    }
}

impl fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mnemonic([REDACTED; {} words])", self.word_count)
    }
}

impl PartialEq for Mnemonic {
    fn eq(&self, other: &Self) -> bool {
        self.phrase.as_str() == other.phrase.as_str()
    }
}

impl Eq for Mnemonic {}

/// 64-byte BIP-39 seed, zeroized on drop
pub struct Seed(Zeroizing<[u8; 64]>);

impl Seed {
    /// Raw seed bytes
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

/// Generates, validates and parses recovery phrases
#[derive(Clone)]
pub struct MnemonicCodec {
    rng: Arc<dyn RandomSource>,
}

impl MnemonicCodec {
    /// Create a codec drawing entropy from `rng`
    pub fn new(rng: Arc<dyn RandomSource>) -> Self {
        Self { rng }
    }

    /// Generate a fresh phrase
    pub fn generate(&self, strength: MnemonicStrength) -> Result<Mnemonic> {
        let phrase = match strength {
            MnemonicStrength::Words12 => {
                let entropy = Zeroizing::new(random_array::<16>(self.rng.as_ref())?);
                encode_entropy(entropy.as_ref())?
            }
            MnemonicStrength::Words24 => {
                let entropy = Zeroizing::new(random_array::<32>(self.rng.as_ref())?);
                encode_entropy(entropy.as_ref())?
            }
        };
        tracing::debug!("Generated {}-word mnemonic", strength.word_count());
        Ok(Mnemonic {
            phrase,
            word_count: strength.word_count(),
        })
    }

    /// Check word-list membership and checksum
    pub fn validate(candidate: &str) -> bool {
        Self::parse(candidate).is_ok()
    }

    /// Validate and wrap a user-supplied phrase
    pub fn parse(candidate: &str) -> Result<Mnemonic> {
        let normalized = normalize(candidate);
        let parsed = bip39::Mnemonic::parse_in_normalized(Language::English, &normalized)
            .map_err(|e| Error::InvalidMnemonic(e.to_string()))?;
        let word_count = parsed.word_count();
        if word_count != 12 && word_count != 24 {
            return Err(Error::InvalidMnemonic(format!(
                "expected 12 or 24 words, got {}",
                word_count
            )));
        }
        Ok(Mnemonic {
            phrase: normalized,
            word_count,
        })
    }
}

impl fmt::Debug for MnemonicCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MnemonicCodec").finish_non_exhaustive()
    }
}

fn encode_entropy(entropy: &[u8]) -> Result<Zeroizing<String>> {
    let mnemonic = bip39::Mnemonic::from_entropy_in(Language::English, entropy)
        .map_err(|e| Error::InvalidMnemonic(e.to_string()))?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

/// Lowercase words joined by single spaces, built in place in a wiped buffer
fn normalize(candidate: &str) -> Zeroizing<String> {
    let mut normalized = Zeroizing::new(String::with_capacity(candidate.len()));
    for word in candidate.split_whitespace() {
        if !normalized.is_empty() {
            normalized.push(' ');
        }
        for c in word.chars().flat_map(char::to_lowercase) {
            normalized.push(c);
        }
    }
    normalized
}
