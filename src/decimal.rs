//! Arbitrary-precision decimal helpers shared across the engine.
//!
//! `rust_decimal::Decimal` gives us 128-bit fixed-point arithmetic with a
//! configurable scale and `MidpointAwayFromZero` (half-up) rounding via
//! [`round_half_up`], applied at every division in the Unit Converter and
//! the recalculation strategies that can produce a non-terminating result
//! (the split fractions, the population-change unit count). `Quantity` and
//! `EngineResult` deserialize `Decimal` values directly through serde's
//! string representation — there is no `f64` boundary anywhere in this
//! crate.

use rust_decimal::Decimal;

/// Round `value` to `scale` decimal digits, half-up (away from zero at the
/// midpoint), matching the engine's fixed math context.
pub fn round_half_up(value: Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Named fast path for a zero check, kept as its own function so call
/// sites read as an intentional check rather than an incidental
/// comparison (Design Note "Decimal library").
#[inline]
pub fn is_zero(value: Decimal) -> bool {
    value.is_zero()
}

/// Clamp a value that must never go negative after a recalculation.
#[inline]
pub fn clamp_non_negative(value: Decimal) -> Decimal {
    if value.is_sign_negative() {
        Decimal::ZERO
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_up() {
        assert_eq!(round_half_up(dec!(1.005), 2), dec!(1.01));
        assert_eq!(round_half_up(dec!(1.004), 2), dec!(1.00));
        assert_eq!(round_half_up(dec!(-1.005), 2), dec!(-1.01));
    }

    #[test]
    fn zero_fast_path() {
        assert!(is_zero(Decimal::ZERO));
        assert!(!is_zero(dec!(0.0001)));
    }

    #[test]
    fn clamps_negative_to_zero() {
        assert_eq!(clamp_non_negative(dec!(-5)), Decimal::ZERO);
        assert_eq!(clamp_non_negative(dec!(5)), dec!(5));
    }
}
