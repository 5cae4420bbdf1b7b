//! Discretized-order curve math.
//!
//! Each side of a Carbon strategy is an order `(y, z, A, B)`: `y` is the remaining
//! liquidity in wei, `z` the order's capacity, and `A`/`B` the compressed square-root
//! price parameters. All integer formulas mirror the on-chain trading functions.

use alloy::primitives::{U256, U512};
use bigdecimal::BigDecimal;
use num_traits::{One, ToPrimitive};
use serde::{Deserialize, Serialize};

use super::concentrated::narrow;
use super::{from_wei, pow10, to_wei, u256_to_f64, MathError};

/// Fixed point scale of the rate parameters, `2^48`
pub const ONE: u64 = 1 << 48;

/// One side of a Carbon strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarbonOrder {
    /// Remaining liquidity (wei of the token this order pays out)
    #[serde(with = "crate::utils::u256_string")]
    pub y: U256,
    /// Order capacity (wei)
    #[serde(with = "crate::utils::u256_string")]
    pub z: U256,
    /// Compressed width of the price range
    #[serde(rename = "A", with = "crate::utils::u256_string")]
    pub a: U256,
    /// Compressed lowest sqrt price
    #[serde(rename = "B", with = "crate::utils::u256_string")]
    pub b: U256,
}

/// Expands a compressed rate: `(value % ONE) << (value / ONE)`.
///
/// # Errors
///
/// Returns `MathError::Overflow` if the expanded value does not fit in 256 bits
pub fn decode_float(value: U256) -> Result<U256, MathError> {
    let one = U256::from(ONE);
    let mantissa = value % one;
    let exponent = usize::try_from(value / one).map_err(|_| MathError::Overflow("decode_float"))?;
    if exponent + mantissa.bit_len() > 256 {
        return Err(MathError::Overflow("decode_float"));
    }
    Ok(mantissa << exponent)
}

/// Compresses a rate into `mantissa | exponent * ONE`, dropping low bits.
#[must_use]
pub fn encode_float(value: U256) -> U256 {
    let exponent = (value / U256::from(ONE)).bit_len();
    let mantissa = value >> exponent;
    mantissa | (U256::from(exponent) * U256::from(ONE))
}

/// Converts a price into its uncompressed rate `floor(sqrt(rate) * ONE)`, truncated to
/// the precision `encode_float` keeps.
///
/// # Errors
///
/// Returns `MathError::Underflow` for negative rates and `MathError::Overflow` if the
/// scaled rate does not fit in 256 bits
pub fn encode_rate(rate: &BigDecimal) -> Result<U256, MathError> {
    let root = rate.sqrt().ok_or(MathError::Underflow("encode_rate"))?;
    let data = super::decimal_to_u256(&(root * BigDecimal::from(ONE)))
        .ok_or(MathError::Overflow("encode_rate"))?;
    let length = (data / U256::from(ONE)).bit_len();
    Ok((data >> length) << length)
}

/// `floor(x * y / z)` with a 512-bit intermediate product
fn mul_div_f(x: U256, y: U256, z: U256) -> Result<U256, MathError> {
    if z.is_zero() {
        return Err(MathError::DivisionByZero("mul_div_f"));
    }
    narrow(U512::from(x) * U512::from(y) / U512::from(z), "mul_div_f")
}

/// `ceil(x * y / z)` with a 512-bit intermediate product
fn mul_div_c(x: U256, y: U256, z: U256) -> Result<U256, MathError> {
    if z.is_zero() {
        return Err(MathError::DivisionByZero("mul_div_c"));
    }
    let z = U512::from(z);
    let w = U512::from(x) * U512::from(y);
    narrow((w + z - U512::from(1)) / z, "mul_div_c")
}

/// Smallest factor that keeps `x * y / factor` inside 256 bits
fn min_factor(x: U256, y: U256) -> Result<U256, MathError> {
    mul_div_c(x, y, U256::MAX)
}

/// Checked 256-bit product
fn mul(x: U256, y: U256, context: &'static str) -> Result<U256, MathError> {
    x.checked_mul(y).ok_or(MathError::Overflow(context))
}

/// Checked 256-bit sum
fn add(x: U256, y: U256, context: &'static str) -> Result<U256, MathError> {
    x.checked_add(y).ok_or(MathError::Overflow(context))
}

/// Target amount (wei) received for `x` wei of source, with expanded rates `a`/`b`.
fn calc_target_amount(x: U256, y: U256, z: U256, a: U256, b: U256) -> Result<U256, MathError> {
    let one = U256::from(ONE);
    if a.is_zero() {
        return mul_div_f(
            x,
            mul(b, b, "calc_target_amount")?,
            mul(one, one, "calc_target_amount")?,
        );
    }
    let temp1 = mul(z, one, "calc_target_amount")?;
    let temp2 = add(
        mul(y, a, "calc_target_amount")?,
        mul(z, b, "calc_target_amount")?,
        "calc_target_amount",
    )?;
    let temp3 = mul(temp2, x, "calc_target_amount")?;
    let factor = min_factor(temp1, temp1)?.max(min_factor(temp3, a)?);
    let temp4 = mul_div_c(temp1, temp1, factor)?;
    let temp5 = mul_div_c(temp3, a, factor)?;
    mul_div_f(
        temp2,
        temp3 / factor,
        add(temp4, temp5, "calc_target_amount")?,
    )
}

/// Source amount (wei) required to receive `x` wei of target, with expanded rates `a`/`b`.
fn calc_source_amount(x: U256, y: U256, z: U256, a: U256, b: U256) -> Result<U256, MathError> {
    let one = U256::from(ONE);
    if a.is_zero() {
        return mul_div_c(
            x,
            mul(one, one, "calc_source_amount")?,
            mul(b, b, "calc_source_amount")?,
        );
    }
    let temp1 = mul(z, one, "calc_source_amount")?;
    let temp2 = add(
        mul(y, a, "calc_source_amount")?,
        mul(z, b, "calc_source_amount")?,
        "calc_source_amount",
    )?;
    let temp3 = temp2
        .checked_sub(mul(x, a, "calc_source_amount")?)
        .ok_or(MathError::Underflow("calc_source_amount"))?;
    let factor = min_factor(temp1, temp1)?.max(min_factor(temp2, temp3)?);
    let temp4 = mul_div_c(temp1, temp1, factor)?;
    let temp5 = mul_div_f(temp2, temp3, factor)?;
    mul_div_c(x, temp4, temp5)
}

/// Target amount (wei) the order pays for `source_amount` wei, before any capacity check.
///
/// # Errors
///
/// Returns a `MathError` if an intermediate value overflows 256 bits
pub fn trade_by_source_amount(source_amount: U256, order: &CarbonOrder) -> Result<U256, MathError> {
    calc_target_amount(
        source_amount,
        order.y,
        order.z,
        decode_float(order.a)?,
        decode_float(order.b)?,
    )
}

/// Source amount (wei) the order requires to pay out `target_amount` wei.
///
/// # Errors
///
/// Returns a `MathError` if an intermediate value overflows or the order has a zero rate
pub fn trade_by_target_amount(target_amount: U256, order: &CarbonOrder) -> Result<U256, MathError> {
    calc_source_amount(
        target_amount,
        order.y,
        order.z,
        decode_float(order.a)?,
        decode_float(order.b)?,
    )
}

/// Fills `amount_in` against `order`, never paying out more than its liquidity `y`.
///
/// When the requested source would overfill the order, the target is clamped to `y`
/// and the source recomputed from it, so the consumed input may be lower than requested.
///
/// # Returns
///
/// `(amount_in consumed, amount_out)` in token units, the output net of `fee`
///
/// # Errors
///
/// Returns a `MathError` if the trading functions fail for this order
pub fn swap_exact(
    order: &CarbonOrder,
    amount_in: &BigDecimal,
    decimals_in: u8,
    decimals_out: u8,
    fee: &BigDecimal,
) -> Result<(BigDecimal, BigDecimal), MathError> {
    let mut source_amount = to_wei(amount_in, decimals_in);
    let mut target_amount = trade_by_source_amount(source_amount, order)?;
    if target_amount > order.y {
        target_amount = order.y;
        source_amount = trade_by_target_amount(target_amount, order)?;
    }
    Ok((
        from_wei(source_amount, decimals_in),
        from_wei(target_amount, decimals_out) * (BigDecimal::one() - fee),
    ))
}

/// Floating point view of one Carbon order, amounts in token units.
#[derive(Debug, Clone, Copy)]
pub struct CarbonApprox {
    /// Liquidity (wei)
    y: f64,
    /// Capacity (wei)
    z: f64,
    /// Expanded `A / ONE`
    a: f64,
    /// Expanded `B / ONE`
    b: f64,
    /// Swap fee
    fee: f64,
    /// `10^decimals` of the source token
    scale_in: f64,
    /// `10^decimals` of the target token
    scale_out: f64,
}

impl CarbonApprox {
    /// Builds the approximate view of `order`.
    ///
    /// # Errors
    ///
    /// Returns `MathError::Overflow` if the order's rates cannot be expanded
    pub fn new(
        order: &CarbonOrder,
        fee: &BigDecimal,
        decimals_in: u8,
        decimals_out: u8,
    ) -> Result<Self, MathError> {
        let one = u256_to_f64(U256::from(ONE));
        Ok(Self {
            y: u256_to_f64(order.y),
            z: u256_to_f64(order.z),
            a: u256_to_f64(decode_float(order.a)?) / one,
            b: u256_to_f64(decode_float(order.b)?) / one,
            fee: fee.to_f64().unwrap_or(0.0),
            scale_in: pow10(decimals_in).to_f64().unwrap_or(1.0),
            scale_out: pow10(decimals_out).to_f64().unwrap_or(1.0),
        })
    }

    /// `y*a + z*b`
    fn width(&self) -> f64 {
        self.y * self.a + self.z * self.b
    }

    /// Target wei for `x` source wei, unbounded by `y`
    fn target_wei(&self, x: f64) -> f64 {
        if self.a == 0.0 {
            return x * self.b * self.b;
        }
        let width = self.width();
        x * width * width / (self.z * self.z + x * self.a * width)
    }

    /// Source wei required for `t` target wei
    fn source_wei(&self, t: f64) -> f64 {
        if self.a == 0.0 {
            return if self.b == 0.0 {
                f64::INFINITY
            } else {
                t / (self.b * self.b)
            };
        }
        let width = self.width();
        t * self.z * self.z / (width * (width - t * self.a))
    }

    /// Marginal price in target tokens per source token, net of fee.
    #[must_use]
    pub fn price(&self) -> f64 {
        if self.y <= 0.0 {
            return 0.0;
        }
        let wei_price = if self.a == 0.0 || self.z == 0.0 {
            self.b * self.b
        } else {
            let ratio = self.width() / self.z;
            ratio * ratio
        };
        wei_price * self.scale_in / self.scale_out * (1.0 - self.fee)
    }

    /// Largest source amount the order can absorb.
    #[must_use]
    pub fn max_in(&self) -> f64 {
        self.source_wei(self.y) / self.scale_in
    }

    /// Output when the order is drained, net of fee.
    #[must_use]
    pub fn max_out(&self) -> f64 {
        self.y / self.scale_out * (1.0 - self.fee)
    }

    /// Liquidity of the order in target tokens.
    #[must_use]
    pub fn holdings(&self) -> f64 {
        self.y / self.scale_out
    }

    /// Output for `amount_in`, or `None` if it would overfill the order.
    #[must_use]
    pub fn swap(&self, amount_in: f64) -> Option<f64> {
        let target = self.target_wei(amount_in * self.scale_in);
        if target > self.y {
            return None;
        }
        Some(target / self.scale_out * (1.0 - self.fee))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::arb::math::decimal_to_f64;

    fn order(y: u128, z: u128, rate_low: &str, rate_high: &str) -> CarbonOrder {
        let low = encode_rate(&BigDecimal::from_str(rate_low).unwrap()).unwrap();
        let high = encode_rate(&BigDecimal::from_str(rate_high).unwrap()).unwrap();
        CarbonOrder {
            y: U256::from(y),
            z: U256::from(z),
            a: encode_float(high - low),
            b: encode_float(low),
        }
    }

    #[test]
    fn test_decode_encode_float() {
        for value in [0_u128, 1, u128::from(ONE) - 1, 1 << 60, (1 << 60) + 12_345, u128::MAX] {
            let value = U256::from(value);
            let decoded = decode_float(encode_float(value)).unwrap();
            let dropped_bits = (value / U256::from(ONE)).bit_len();
            assert_eq!(decoded, (value >> dropped_bits) << dropped_bits);
            assert!(decoded <= value);
        }
        assert_eq!(
            decode_float(U256::from(300_u64) * U256::from(ONE) + U256::from(1)),
            Err(MathError::Overflow("decode_float"))
        );
    }

    #[test]
    fn test_encode_rate() {
        let two = encode_rate(&BigDecimal::from(4)).unwrap();
        assert!(two <= U256::from(2 * ONE));
        assert!(two >= U256::from(2 * ONE - 4));
        // low bits are dropped so that encode_float is lossless on the result
        let rate = encode_rate(&BigDecimal::from_str("3000.123").unwrap()).unwrap();
        assert_eq!(decode_float(encode_float(rate)).unwrap(), rate);
    }

    #[test]
    fn test_flat_order_trades_at_its_rate() {
        let flat = CarbonOrder {
            y: U256::from(500),
            z: U256::from(500),
            a: U256::ZERO,
            b: encode_float(U256::from(ONE)),
        };
        assert_eq!(trade_by_source_amount(U256::from(100), &flat).unwrap(), U256::from(100));
        assert_eq!(trade_by_target_amount(U256::from(100), &flat).unwrap(), U256::from(100));

        let (consumed, out) =
            swap_exact(&flat, &BigDecimal::from(1000), 0, 0, &BigDecimal::from(0)).unwrap();
        assert_eq!(consumed, BigDecimal::from(500));
        assert_eq!(out, BigDecimal::from(500));
    }

    #[test]
    fn test_capacity_invariant() {
        let y = 2_000_000_000_000_000_000_u128;
        let linear = order(y, 3 * y, "300000000", "400000000");
        for amount_in in ["0.001", "1", "100", "10000", "1000000000"] {
            let amount_in = BigDecimal::from_str(amount_in).unwrap();
            let source = to_wei(&amount_in, 6);
            let (consumed, out) =
                swap_exact(&linear, &amount_in, 6, 18, &BigDecimal::from(0)).unwrap();
            assert!(to_wei(&out, 18) <= linear.y);
            assert!(to_wei(&consumed, 6) <= source);
        }
    }

    #[test]
    fn test_capacity_invariant_random_orders() {
        const ROUNDS: usize = 500;
        let mut rng = StdRng::seed_from_u64(0x00c4_7b07);
        let fee = BigDecimal::from_str("0.002").unwrap();
        let mut filled = 0;
        for _ in 0..ROUNDS {
            let y = rng.random_range(1..1_u128 << 60);
            let order = CarbonOrder {
                y: U256::from(y),
                z: U256::from(y + rng.random_range(0..=y)),
                a: encode_float(U256::from(rng.random_range(0..1_u64 << 58))),
                b: encode_float(U256::from(rng.random_range(1_u64 << 20..1_u64 << 58))),
            };
            let decimals_in = rng.random_range(0..=18_u8);
            let decimals_out = rng.random_range(0..=18_u8);
            let source = U256::from(rng.random_range(1..1_u128 << 60));
            let amount_in = from_wei(source, decimals_in);

            let Ok((consumed, out)) =
                swap_exact(&order, &amount_in, decimals_in, decimals_out, &fee)
            else {
                continue;
            };
            assert!(
                to_wei(&out, decimals_out) <= order.y,
                "{order:?} paid {out} for {amount_in}"
            );
            assert!(
                to_wei(&consumed, decimals_in) <= source,
                "{order:?} took {consumed} of {amount_in}"
            );
            filled += 1;
        }
        assert!(filled > ROUNDS / 2, "only {filled} of {ROUNDS} orders filled");
    }

    #[test]
    fn test_approx_matches_exact() {
        let y = 2_000_000_000_000_000_000_u128;
        let linear = order(y, 3 * y, "300000000", "400000000");
        let fee = BigDecimal::from_str("0.002").unwrap();
        let approx = CarbonApprox::new(&linear, &fee, 6, 18).unwrap();

        let (_, exact) = swap_exact(&linear, &BigDecimal::from(100), 6, 18, &fee).unwrap();
        let estimate = approx.swap(100.0).unwrap();
        assert!((decimal_to_f64(&exact) - estimate).abs() / estimate < 1e-6);

        assert!(approx.swap(approx.max_in() * 1.01).is_none());
        let at_max = approx.swap(approx.max_in() * 0.999_999).unwrap();
        assert!((at_max - approx.max_out()).abs() / approx.max_out() < 1e-3);
        assert!(approx.price() > 0.0);
    }
}
