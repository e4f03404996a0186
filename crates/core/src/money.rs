//! Monetary policy shared by every balance comparison in the ledger.
//!
//! Amounts are exact decimals (`rust_decimal`), rounded to the currency
//! minor unit before persistence. Comparisons against balances allow a
//! fixed tolerance of half a minor unit, so a caller-supplied amount
//! that is representationally a hair above a balance still settles it.

use rust_decimal::Decimal;

/// Decimal places of the currency minor unit.
pub const MINOR_UNIT_DP: u32 = 2;

/// Comparison tolerance: half of the smallest currency subunit.
pub fn tolerance() -> Decimal {
    Decimal::new(5, 3) // 0.005
}

/// Round to the minor unit. Applied to every amount before it is
/// persisted or compared against stored balances.
pub fn round_minor(amount: Decimal) -> Decimal {
    amount.round_dp(MINOR_UNIT_DP)
}

/// True when `amount` is over `limit` by more than the tolerance.
pub fn exceeds(amount: Decimal, limit: Decimal) -> bool {
    amount > limit + tolerance()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn exceeds_respects_tolerance() {
        assert!(!exceeds(dec("500.00"), dec("500.00")));
        assert!(!exceeds(dec("500.004"), dec("500.00")));
        assert!(exceeds(dec("500.01"), dec("500.00")));
        assert!(exceeds(dec("500.006"), dec("500.00")));
    }

    #[test]
    fn rounds_to_minor_unit() {
        assert_eq!(round_minor(dec("10.005")), dec("10.00"));
        assert_eq!(round_minor(dec("10.015")), dec("10.02"));
        assert_eq!(round_minor(dec("10.1")), dec("10.10"));
    }
}
