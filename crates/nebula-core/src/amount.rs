//! Decimal amount parsing and formatting
//!
//! Amounts are converted between display strings and integer base units
//! without going through floating point.

use crate::{Error, Result};
use nebula_params::{LAMPORTS_PER_SOL, SOL_DECIMALS};

/// Largest decimal precision a token mint can declare
pub const MAX_DECIMALS: u8 = 19;

/// Parse a SOL amount into lamports. More than nine decimals is rejected.
pub fn parse_sol(input: &str) -> Result<u64> {
    parse_units(input, SOL_DECIMALS, Rounding::Exact)
}

/// Format lamports as SOL with all nine decimals
pub fn format_sol(lamports: u64) -> String {
    format_units(lamports, SOL_DECIMALS)
}

/// Lamports as a floating SOL value, for display only
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Parse a token UI amount into base units, flooring excess precision
pub fn parse_ui_amount(input: &str, decimals: u8) -> Result<u64> {
    parse_units(input, decimals, Rounding::Floor)
}

/// Format base units with `decimals` places
pub fn format_ui_amount(raw: u64, decimals: u8) -> String {
    format_units(raw, decimals)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Rounding {
    Exact,
    Floor,
}

fn parse_units(input: &str, decimals: u8, rounding: Rounding) -> Result<u64> {
    if decimals > MAX_DECIMALS {
        return Err(Error::InvalidAmount(format!("unsupported decimals {}", decimals)));
    }
    let text = input.trim();
    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !digits_only(whole) || !digits_only(frac) {
        return Err(Error::InvalidAmount(format!("'{}' is not a decimal number", input)));
    }

    let places = usize::from(decimals);
    let frac = if frac.len() > places {
        let (kept, dropped) = frac.split_at(places);
        if rounding == Rounding::Exact && dropped.bytes().any(|b| b != b'0') {
            return Err(Error::InvalidAmount(format!(
                "'{}' has more than {} decimal places",
                input, decimals
            )));
        }
        kept
    } else {
        frac
    };

    let scale = 10u128.pow(u32::from(decimals));
    let whole_units = if whole.is_empty() {
        0u128
    } else {
        whole
            .parse::<u128>()
            .map_err(|_| Error::InvalidAmount(format!("'{}' is too large", input)))?
    };
    let frac_units = if frac.is_empty() {
        0u128
    } else {
        let padded = format!("{:0<width$}", frac, width = places);
        padded
            .parse::<u128>()
            .map_err(|_| Error::InvalidAmount(format!("'{}' is not a decimal number", input)))?
    };

    let total = whole_units
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_units))
        .ok_or_else(|| Error::InvalidAmount(format!("'{}' is too large", input)))?;
    u64::try_from(total).map_err(|_| Error::InvalidAmount(format!("'{}' is too large", input)))
}

fn format_units(raw: u64, decimals: u8) -> String {
    if decimals == 0 {
        return raw.to_string();
    }
    let scale = 10u128.pow(u32::from(decimals.min(MAX_DECIMALS)));
    let raw = u128::from(raw);
    format!(
        "{}.{:0width$}",
        raw / scale,
        raw % scale,
        width = usize::from(decimals)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sol() {
        assert_eq!(parse_sol("1").unwrap(), 1_000_000_000);
        assert_eq!(parse_sol("1.5").unwrap(), 1_500_000_000);
        assert_eq!(parse_sol("0.000000001").unwrap(), 1);
        assert_eq!(parse_sol(".25").unwrap(), 250_000_000);
        assert_eq!(parse_sol("2.").unwrap(), 2_000_000_000);
        assert_eq!(parse_sol("0.1000000000").unwrap(), 100_000_000);
    }

    #[test]
    fn test_parse_sol_rejects() {
        assert!(parse_sol("").is_err());
        assert!(parse_sol(".").is_err());
        assert!(parse_sol("-1").is_err());
        assert!(parse_sol("1e9").is_err());
        assert!(parse_sol("0.0000000001").is_err());
        assert!(parse_sol("18446744074").is_err());
    }

    #[test]
    fn test_parse_ui_amount_floors() {
        assert_eq!(parse_ui_amount("12.345678", 6).unwrap(), 12_345_678);
        assert_eq!(parse_ui_amount("1.9999", 2).unwrap(), 199);
        assert_eq!(parse_ui_amount("7", 0).unwrap(), 7);
        assert_eq!(parse_ui_amount("7.9", 0).unwrap(), 7);
    }

    #[test]
    fn test_format() {
        assert_eq!(format_sol(1_500_000_000), "1.500000000");
        assert_eq!(format_sol(1), "0.000000001");
        assert_eq!(format_ui_amount(12_345_678, 6), "12.345678");
        assert_eq!(format_ui_amount(42, 0), "42");
    }

    #[test]
    fn test_lamports_to_sol() {
        assert_eq!(lamports_to_sol(2_500_000_000), 2.5);
    }
}
