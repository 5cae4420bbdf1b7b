//! # Curve math
//!
//! Pure pricing functions per curve kind. Every exact function works on `BigDecimal`
//! token amounts or `U256` wei amounts and never touches floating point. The `*_approx`
//! functions are the `f64` transport view used by the finders and optimizers, where
//! speed matters more than the last wei.

use alloy::primitives::U256;
use bigdecimal::{BigDecimal, RoundingMode};
use num_bigint::{BigInt, Sign};
use num_traits::{One, Signed, ToPrimitive};
use thiserror::Error;

/// Discretized-order (Carbon) curve math
pub mod carbon;
/// Concentrated-liquidity (Uniswap V3 style) curve math
pub mod concentrated;
/// Constant-product (x*y=k) curve math
pub mod constant_product;

/// Arithmetic failures inside the curve math.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    /// An intermediate value left the 256-bit range
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
    /// A subtraction went below zero
    #[error("arithmetic underflow in {0}")]
    Underflow(&'static str),
    /// A divisor was zero
    #[error("division by zero in {0}")]
    DivisionByZero(&'static str),
    /// A tick outside of the supported range
    #[error("tick {0} out of range")]
    TickOutOfRange(i32),
}

/// Returns `10^decimals` as an exact decimal.
#[must_use]
pub fn pow10(decimals: u8) -> BigDecimal {
    BigDecimal::new(BigInt::one(), -i64::from(decimals))
}

/// Truncates `amount` toward zero to the granularity of a token with `decimals` decimals.
#[must_use]
pub fn quantize(amount: &BigDecimal, decimals: u8) -> BigDecimal {
    amount.with_scale_round(i64::from(decimals), RoundingMode::Down)
}

/// The fixed haircut applied to every simulated output.
#[must_use]
pub fn safety_haircut() -> BigDecimal {
    BigDecimal::new(BigInt::from(9999), 4)
}

/// Converts a non-negative integer `U256` into an exact decimal.
#[must_use]
pub fn u256_to_decimal(value: U256) -> BigDecimal {
    BigDecimal::new(
        BigInt::from_bytes_be(Sign::Plus, &value.to_be_bytes::<32>()),
        0,
    )
}

/// Converts the integer part of a decimal into a `U256`, truncating toward zero.
///
/// # Returns
///
/// `None` if the value is negative or does not fit into 256 bits
#[must_use]
pub fn decimal_to_u256(value: &BigDecimal) -> Option<U256> {
    if value.is_negative() {
        return None;
    }
    let (int, _) = value.with_scale_round(0, RoundingMode::Down).into_bigint_and_exponent();
    let (_, bytes) = int.to_bytes_be();
    U256::try_from_be_slice(&bytes)
}

/// Converts a token amount into wei: `floor(amount * 10^decimals)`.
///
/// Negative amounts have no wei representation and map to zero.
#[must_use]
pub fn to_wei(amount: &BigDecimal, decimals: u8) -> U256 {
    decimal_to_u256(&(amount * pow10(decimals))).unwrap_or(U256::ZERO)
}

/// Converts a wei amount into a token amount with `decimals` decimals.
#[must_use]
pub fn from_wei(amount: U256, decimals: u8) -> BigDecimal {
    BigDecimal::new(
        BigInt::from_bytes_be(Sign::Plus, &amount.to_be_bytes::<32>()),
        i64::from(decimals),
    )
}

/// Lossy conversion of an exact decimal into `f64`, zero if not representable.
#[must_use]
pub fn decimal_to_f64(value: &BigDecimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Lossy conversion of a `U256` into `f64`.
#[must_use]
pub fn u256_to_f64(value: U256) -> f64 {
    f64::from(value)
}

/// `2^96` as an exact decimal.
#[must_use]
pub fn q96() -> BigDecimal {
    u256_to_decimal(U256::from(1) << 96)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_quantize_truncates() {
        for (amount, decimals, expected) in &[
            // amount,          decimals, expected
            ("1.23456789", 6, "1.234567"),
            ("0.0000009", 6, "0.000000"),
            ("12.5", 0, "12"),
            ("3.999999999999999999999", 18, "3.999999999999999999"),
        ] {
            let amount = BigDecimal::from_str(amount).unwrap();
            let expected = BigDecimal::from_str(expected).unwrap();
            assert_eq!(quantize(&amount, *decimals), expected);
        }
    }

    #[test]
    fn test_quantize_is_idempotent() {
        let amount = BigDecimal::from_str("1234.567890123456789").unwrap();
        let once = quantize(&amount, 6);
        assert_eq!(quantize(&once, 6), once);
    }

    #[test]
    fn test_wei_conversions() {
        let amount = BigDecimal::from_str("1.5").unwrap();
        assert_eq!(to_wei(&amount, 18), U256::from(1_500_000_000_000_000_000_u128));
        assert_eq!(to_wei(&amount, 0), U256::from(1));
        assert_eq!(
            from_wei(U256::from(1_500_000), 6),
            BigDecimal::from_str("1.5").unwrap()
        );
        assert_eq!(to_wei(&BigDecimal::from(-1), 6), U256::ZERO);
    }

    #[test]
    fn test_wei_floor_is_exact_for_large_amounts() {
        let amount = BigDecimal::from_str("123456789012345678.123456789012345678").unwrap();
        assert_eq!(
            to_wei(&amount, 18).to_string(),
            "123456789012345678123456789012345678"
        );
    }

    #[test]
    fn test_u256_decimal_roundtrip() {
        let value = U256::from(1) << 200;
        assert_eq!(decimal_to_u256(&u256_to_decimal(value)), Some(value));
        assert_eq!(q96(), u256_to_decimal(U256::from(1) << 96));
    }
}
