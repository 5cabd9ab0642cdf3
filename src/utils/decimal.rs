//! Decimal arithmetic utilities for capital sizing.

use rust_decimal::Decimal;

/// Round a decimal to a specific number of decimal places.
pub fn round_to_precision(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp(decimals)
}

/// Convert a solver fraction to a decimal, `None` for NaN or infinity.
pub fn to_decimal(value: f64) -> Option<Decimal> {
    Decimal::from_f64_retain(value)
}

/// USD notional for an allocation fraction of the deployable capital, in cents.
pub fn notional_for(capital: Decimal, fraction: f64) -> Decimal {
    let fraction = to_decimal(fraction).unwrap_or(Decimal::ZERO);
    round_to_precision(capital * fraction, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_to_precision() {
        assert_eq!(round_to_precision(dec!(1.23456), 2), dec!(1.23));
        assert_eq!(round_to_precision(dec!(1.235), 2), dec!(1.24));
    }

    #[test]
    fn test_notional_for() {
        assert_eq!(notional_for(dec!(10000), 0.5), dec!(5000.00));
        assert_eq!(notional_for(dec!(10000), 0.3125), dec!(3125.00));
        assert_eq!(notional_for(dec!(10000), 0.0), Decimal::ZERO);
    }

    #[test]
    fn test_notional_for_non_finite_fraction_is_zero() {
        assert_eq!(notional_for(dec!(10000), f64::NAN), Decimal::ZERO);
    }

    #[test]
    fn test_to_decimal() {
        assert_eq!(to_decimal(0.25), Some(dec!(0.25)));
        assert_eq!(to_decimal(f64::INFINITY), None);
    }
}
