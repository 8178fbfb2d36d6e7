//! Randomness port
//!
//! Every salt, nonce and entropy draw goes through [`RandomSource`] so callers
//! can inject a deterministic source in tests. A failing source is reported
//! as [`Error::Randomness`]; there is no fallback generator.

use crate::{Error, Result};
use rand::rngs::OsRng;
use rand::RngCore;

/// Source of cryptographically secure random bytes
pub trait RandomSource: Send + Sync {
    /// Fill `dest` completely or fail
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()>;
}

/// Draw a fixed-size array from `rng`
pub fn random_array<const N: usize>(rng: &dyn RandomSource) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    rng.fill_bytes(&mut out)?;
    Ok(out)
}

/// Operating system CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| Error::Randomness(e.to_string()))
    }
}

/// Deterministic generator for tests
#[cfg(any(test, feature = "test-helpers"))]
pub struct SeededRandom {
    rng: parking_lot::Mutex<rand::rngs::StdRng>,
}

#[cfg(any(test, feature = "test-helpers"))]
impl SeededRandom {
    /// Create a generator from a fixed seed
    pub fn new(seed: u64) -> Self {
        use rand::SeedableRng;
        Self {
            rng: parking_lot::Mutex::new(rand::rngs::StdRng::seed_from_u64(seed)),
        }
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl RandomSource for SeededRandom {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
        self.rng.lock().fill_bytes(dest);
        Ok(())
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl std::fmt::Debug for SeededRandom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SeededRandom")
    }
}

/// Source that always fails, for exercising error paths
#[cfg(any(test, feature = "test-helpers"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingRandom;

#[cfg(any(test, feature = "test-helpers"))]
impl RandomSource for FailingRandom {
    fn fill_bytes(&self, _dest: &mut [u8]) -> Result<()> {
        Err(Error::Randomness("entropy source unavailable".to_string()))
    }
}
