//! Money rounding helpers.
//!
//! All monetary amounts in the shop are `rust_decimal::Decimal` values in the
//! store currency's standard unit. Every amount that is persisted or shown to
//! a buyer goes through [`round2`] so that subtotal, shipping and total agree
//! to the cent.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round a monetary amount to 2 decimal places.
///
/// Uses midpoint-away-from-zero rounding, matching how the payment gateway
/// rounds charge amounts.
#[must_use]
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2_midpoint_rounds_up() {
        assert_eq!(round2(Decimal::new(12345, 3)), Decimal::new(1235, 2)); // 12.345 -> 12.35
    }

    #[test]
    fn test_round2_already_exact() {
        assert_eq!(round2(Decimal::new(1999, 2)), Decimal::new(1999, 2));
    }

    #[test]
    fn test_round2_negative_midpoint() {
        // -0.005 rounds away from zero to -0.01
        assert_eq!(round2(Decimal::new(-5, 3)), Decimal::new(-1, 2));
    }
}
