//! Transaction fee policy
//!
//! The base fee is quoted by the cluster per message. When it cannot be
//! asked, the wallet assumes one signature at the default rate. Priority
//! fees apply to native transfers only.

use crate::{Error, Result};
use nebula_params::DEFAULT_SIGNATURE_FEE_LAMPORTS;

/// Fee assumed when the cluster cannot quote one (lamports)
pub const FALLBACK_FEE: u64 = DEFAULT_SIGNATURE_FEE_LAMPORTS;

/// Compute units a plain transfer is budgeted for
pub const DEFAULT_COMPUTE_UNIT_LIMIT: u64 = 200_000;

/// Maximum accepted priority fee (micro-lamports per compute unit)
pub const MAX_PRIORITY_FEE_MICRO_LAMPORTS: u64 = 50_000_000;

const MICRO_LAMPORTS_PER_LAMPORT: u64 = 1_000_000;

/// Fee calculator
#[derive(Debug, Clone, Default)]
pub struct FeeCalculator;

impl FeeCalculator {
    /// Create new fee calculator
    pub fn new() -> Self {
        Self
    }

    /// Fee to report when the quote is unavailable
    pub fn fallback_fee(&self) -> u64 {
        tracing::debug!("Using fallback fee: {} lamports", FALLBACK_FEE);
        FALLBACK_FEE
    }

    /// Reject priority fees above the safety limit
    pub fn validate_priority_fee(&self, micro_lamports: u64) -> Result<()> {
        if micro_lamports > MAX_PRIORITY_FEE_MICRO_LAMPORTS {
            return Err(Error::InvalidAmount(format!(
                "Priority fee {} micro-lamports exceeds maximum {}",
                micro_lamports, MAX_PRIORITY_FEE_MICRO_LAMPORTS
            )));
        }
        Ok(())
    }

    /// Upper bound of the priority surcharge in lamports, rounded up
    pub fn priority_fee_lamports(&self, micro_lamports: u64, compute_units: u64) -> u64 {
        let total = u128::from(micro_lamports) * u128::from(compute_units);
        let lamports = total.div_ceil(u128::from(MICRO_LAMPORTS_PER_LAMPORT));
        u64::try_from(lamports).unwrap_or(u64::MAX)
    }

    /// Lamports a sender must hold to move `amount` given a quoted `fee`
    pub fn required_balance(&self, amount: u64, fee: u64) -> Result<u64> {
        amount
            .checked_add(fee)
            .ok_or_else(|| Error::InvalidAmount("amount plus fee overflows".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_fee() {
        assert_eq!(FeeCalculator::new().fallback_fee(), 5_000);
    }

    #[test]
    fn test_priority_fee_validation() {
        let calc = FeeCalculator::new();
        assert!(calc.validate_priority_fee(0).is_ok());
        assert!(calc.validate_priority_fee(MAX_PRIORITY_FEE_MICRO_LAMPORTS).is_ok());
        assert!(matches!(
            calc.validate_priority_fee(MAX_PRIORITY_FEE_MICRO_LAMPORTS + 1),
            Err(Error::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_priority_fee_lamports_rounds_up() {
        let calc = FeeCalculator::new();
        assert_eq!(calc.priority_fee_lamports(0, DEFAULT_COMPUTE_UNIT_LIMIT), 0);
        assert_eq!(calc.priority_fee_lamports(1, 1), 1);
        assert_eq!(calc.priority_fee_lamports(10_000, DEFAULT_COMPUTE_UNIT_LIMIT), 2_000);
    }

    #[test]
    fn test_required_balance_overflow() {
        let calc = FeeCalculator::new();
        assert_eq!(calc.required_balance(100, 5_000).unwrap(), 5_100);
        assert!(calc.required_balance(u64::MAX, 1).is_err());
    }
}
