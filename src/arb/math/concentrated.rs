use alloy::primitives::{uint, U256, U512};
use bigdecimal::{BigDecimal, RoundingMode};
use num_traits::{One, Zero};

use super::{pow10, q96, quantize, u256_to_decimal, u256_to_f64, MathError};

/// Lowest tick supported by concentrated-liquidity pools
pub const MIN_TICK: i32 = -887_272;
/// Highest tick supported by concentrated-liquidity pools
pub const MAX_TICK: i32 = 887_272;

/// Multiplies by a Q128 factor and shifts back, keeping the result in 256 bits.
fn mul_shift(val: U256, mul: U256) -> Result<U256, MathError> {
    let product = (U512::from(val) * U512::from(mul)) >> 128;
    narrow(product, "mul_shift")
}

/// Narrows a 512-bit value into 256 bits.
pub(super) fn narrow(value: U512, context: &'static str) -> Result<U256, MathError> {
    if value > U512::from(U256::MAX) {
        return Err(MathError::Overflow(context));
    }
    let limbs = value.as_limbs();
    Ok(U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]]))
}

/// `sqrt(1.0001^tick) * 2^96`, bit-exact with the on-chain tick math.
///
/// # Errors
///
/// Returns `MathError::TickOutOfRange` if `tick` is outside `[MIN_TICK, MAX_TICK]`
pub fn sqrt_ratio_at_tick(tick: i32) -> Result<U256, MathError> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(MathError::TickOutOfRange(tick));
    }
    let abs_tick = tick.unsigned_abs();

    let mut ratio = if abs_tick & 0x1 != 0 {
        uint!(340265354078544963557816517032075149313_U256)
    } else {
        U256::from(1) << 128
    };

    for (bit, factor) in [
        (0x2, uint!(340248342086729790484326174814286782778_U256)),
        (0x4, uint!(340214320654664324051920982716015181260_U256)),
        (0x8, uint!(340146279804372648236100729048003433010_U256)),
        (0x10, uint!(340010263488231146823593991679159461444_U256)),
        (0x20, uint!(339738377640345403697157401104375502016_U256)),
        (0x40, uint!(339195258003219555707060102825153631437_U256)),
        (0x80, uint!(338111622100601834656805679988414492116_U256)),
        (0x100, uint!(335954724994790223023589805789778977700_U256)),
        (0x200, uint!(331682121138379247127172139029665121542_U256)),
        (0x400, uint!(323299236684853023288211250268160618739_U256)),
        (0x800, uint!(307163716377032838986818679792566494060_U256)),
        (0x1000, uint!(277268403626896220199687919605761273479_U256)),
        (0x2000, uint!(225923453940433267636798934304364539094_U256)),
        (0x4000, uint!(149997214084966997727330243047573785013_U256)),
        (0x8000, uint!(66119101136024775247248025602762854035_U256)),
        (0x10000, uint!(12847376061790713180796276485854237480_U256)),
        (0x20000, uint!(485053260817517664689734240087928014_U256)),
        (0x40000, uint!(691302230200181411898734117117509_U256)),
        (0x80000, uint!(1404880482626894131621879_U256)),
    ] {
        if abs_tick & bit != 0 {
            ratio = mul_shift(ratio, factor)?;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // round up so that the price is never understated
    let shifted = ratio >> 32;
    let remainder: U256 = ratio & ((U256::from(1) << 32) - U256::from(1));
    Ok(if remainder.is_zero() {
        shifted
    } else {
        shifted + U256::from(1)
    })
}

/// Returns the tick range `[lower, upper]` of the spacing-aligned bucket containing `tick`.
#[must_use]
pub fn active_tick_range(tick: i32, tick_spacing: i32) -> (i32, i32) {
    let spacing = tick_spacing.max(1);
    let lower = tick.div_euclid(spacing) * spacing;
    (lower.max(MIN_TICK), (lower + spacing).min(MAX_TICK))
}

/// Exact state of a concentrated-liquidity curve within its active range.
///
/// Prices are sqrt prices scaled by `2^96`, in wei of token1 per wei of token0.
#[derive(Debug, Clone)]
pub struct ConcentratedState {
    /// Active liquidity
    pub liquidity: BigDecimal,
    /// Current sqrt price (Q96)
    pub sqrt_price: BigDecimal,
    /// Sqrt price at the lower bound of the active range (Q96)
    pub sqrt_lower: BigDecimal,
    /// Sqrt price at the upper bound of the active range (Q96)
    pub sqrt_upper: BigDecimal,
    /// Swap fee as a fraction
    pub fee: BigDecimal,
    /// Decimals of token0
    pub decimals0: u8,
    /// Decimals of token1
    pub decimals1: u8,
}

impl ConcentratedState {
    /// Builds the exact state from the on-chain parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the active range cannot be computed for `tick`
    pub fn new(
        liquidity: u128,
        sqrt_price_q96: U256,
        tick: i32,
        tick_spacing: i32,
        fee: &BigDecimal,
        decimals0: u8,
        decimals1: u8,
    ) -> Result<Self, MathError> {
        let (lower, upper) = active_tick_range(tick, tick_spacing);
        Ok(Self {
            liquidity: BigDecimal::from(liquidity),
            sqrt_price: u256_to_decimal(sqrt_price_q96),
            sqrt_lower: u256_to_decimal(sqrt_ratio_at_tick(lower)?),
            sqrt_upper: u256_to_decimal(sqrt_ratio_at_tick(upper)?),
            fee: fee.clone(),
            decimals0,
            decimals1,
        })
    }

    /// Swaps token0 for token1; the price moves down toward `sqrt_lower`.
    ///
    /// # Returns
    ///
    /// `(amount_in consumed, amount_out)` in token units. The consumed amount is lower
    /// than requested when the request would cross the lower bound of the active range.
    ///
    /// # Errors
    ///
    /// Returns `MathError::DivisionByZero` on a curve without liquidity or price
    pub fn swap_token0_in(
        &self,
        amount_in: &BigDecimal,
    ) -> Result<(BigDecimal, BigDecimal), MathError> {
        if self.liquidity.is_zero() || self.sqrt_price.is_zero() || self.sqrt_lower.is_zero() {
            return Err(MathError::DivisionByZero("swap_token0_in"));
        }
        let q96 = q96();
        let net = BigDecimal::one() - &self.fee;
        let l_q96 = &self.liquidity * &q96;

        let max_net_wei = &l_q96 * (&self.sqrt_price - &self.sqrt_lower)
            / (&self.sqrt_price * &self.sqrt_lower);
        let max_in = quantize(&(max_net_wei / &net / pow10(self.decimals0)), self.decimals0);
        let consumed = if amount_in > &max_in {
            max_in
        } else {
            amount_in.clone()
        };

        let effective = &consumed * &net * pow10(self.decimals0);
        let numerator = &l_q96 * &self.sqrt_price;
        let denominator = &l_q96 + effective * &self.sqrt_price;
        let mut sqrt_next = (numerator / denominator).with_scale_round(0, RoundingMode::Floor);
        if sqrt_next < self.sqrt_lower {
            sqrt_next = self.sqrt_lower.clone();
        }

        let out_wei = &self.liquidity * (&self.sqrt_price - sqrt_next) / q96;
        Ok((consumed, out_wei / pow10(self.decimals1)))
    }

    /// Swaps token1 for token0; the price moves up toward `sqrt_upper`.
    ///
    /// # Returns
    ///
    /// `(amount_in consumed, amount_out)` in token units, with the consumed amount
    /// capped at the upper bound of the active range.
    ///
    /// # Errors
    ///
    /// Returns `MathError::DivisionByZero` on a curve without liquidity or price
    pub fn swap_token1_in(
        &self,
        amount_in: &BigDecimal,
    ) -> Result<(BigDecimal, BigDecimal), MathError> {
        if self.liquidity.is_zero() || self.sqrt_price.is_zero() {
            return Err(MathError::DivisionByZero("swap_token1_in"));
        }
        let q96 = q96();
        let net = BigDecimal::one() - &self.fee;

        let max_net_wei = &self.liquidity * (&self.sqrt_upper - &self.sqrt_price) / &q96;
        let max_in = quantize(&(max_net_wei / &net / pow10(self.decimals1)), self.decimals1);
        let consumed = if amount_in > &max_in {
            max_in
        } else {
            amount_in.clone()
        };

        let effective = &consumed * &net * pow10(self.decimals1);
        let mut sqrt_next = &self.sqrt_price + effective * &q96 / &self.liquidity;
        if sqrt_next > self.sqrt_upper {
            sqrt_next = self.sqrt_upper.clone();
        }

        let out_wei = &self.liquidity * &q96 * (&sqrt_next - &self.sqrt_price)
            / &sqrt_next
            / &self.sqrt_price;
        Ok((consumed, out_wei / pow10(self.decimals0)))
    }
}

/// Floating point view of a concentrated-liquidity curve, in raw (unscaled) sqrt prices.
#[derive(Debug, Clone, Copy)]
pub struct ConcentratedApprox {
    /// Active liquidity
    pub liquidity: f64,
    /// Current sqrt price
    pub sqrt_price: f64,
    /// Lower sqrt price bound
    pub sqrt_lower: f64,
    /// Upper sqrt price bound
    pub sqrt_upper: f64,
    /// Swap fee as a fraction
    pub fee: f64,
    /// `10^decimals0`
    pub scale0: f64,
    /// `10^decimals1`
    pub scale1: f64,
}

impl ConcentratedApprox {
    /// Builds the approximate view from the on-chain parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the active range cannot be computed for `tick`
    pub fn new(
        liquidity: u128,
        sqrt_price_q96: U256,
        tick: i32,
        tick_spacing: i32,
        fee: f64,
        decimals0: u8,
        decimals1: u8,
    ) -> Result<Self, MathError> {
        let q96 = u256_to_f64(U256::from(1) << 96);
        let (lower, upper) = active_tick_range(tick, tick_spacing);
        #[allow(clippy::cast_precision_loss)]
        let liquidity = liquidity as f64;
        Ok(Self {
            liquidity,
            sqrt_price: u256_to_f64(sqrt_price_q96) / q96,
            sqrt_lower: u256_to_f64(sqrt_ratio_at_tick(lower)?) / q96,
            sqrt_upper: u256_to_f64(sqrt_ratio_at_tick(upper)?) / q96,
            fee,
            scale0: 10f64.powi(i32::from(decimals0)),
            scale1: 10f64.powi(i32::from(decimals1)),
        })
    }

    /// Marginal price in output tokens per input token, net of fee.
    #[must_use]
    pub fn price(&self, zero_for_one: bool) -> f64 {
        let raw = self.sqrt_price * self.sqrt_price;
        if zero_for_one {
            raw * self.scale0 / self.scale1 * (1.0 - self.fee)
        } else if raw > 0.0 {
            self.scale1 / (raw * self.scale0) * (1.0 - self.fee)
        } else {
            0.0
        }
    }

    /// Largest input (token units) that stays inside the active range.
    #[must_use]
    pub fn max_in(&self, zero_for_one: bool) -> f64 {
        let net_wei = if zero_for_one {
            self.liquidity * (1.0 / self.sqrt_lower - 1.0 / self.sqrt_price)
        } else {
            self.liquidity * (self.sqrt_upper - self.sqrt_price)
        };
        let scale = if zero_for_one { self.scale0 } else { self.scale1 };
        (net_wei / (1.0 - self.fee) / scale).max(0.0)
    }

    /// Output (token units) when the whole active range is consumed.
    #[must_use]
    pub fn max_out(&self, zero_for_one: bool) -> f64 {
        if zero_for_one {
            (self.liquidity * (self.sqrt_price - self.sqrt_lower) / self.scale1).max(0.0)
        } else {
            (self.liquidity * (1.0 / self.sqrt_price - 1.0 / self.sqrt_upper) / self.scale0)
                .max(0.0)
        }
    }

    /// Output for `amount_in`, or `None` if the input would leave the active range.
    #[must_use]
    pub fn swap(&self, zero_for_one: bool, amount_in: f64) -> Option<f64> {
        if amount_in > self.max_in(zero_for_one) {
            return None;
        }
        if zero_for_one {
            let effective = amount_in * self.scale0 * (1.0 - self.fee);
            let next = self.liquidity * self.sqrt_price
                / (self.liquidity + effective * self.sqrt_price);
            Some(self.liquidity * (self.sqrt_price - next) / self.scale1)
        } else {
            let effective = amount_in * self.scale1 * (1.0 - self.fee);
            let next = self.sqrt_price + effective / self.liquidity;
            Some(self.liquidity * (1.0 / self.sqrt_price - 1.0 / next) / self.scale0)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::arb::math::decimal_to_f64;

    #[test]
    fn test_sqrt_ratio_at_tick() {
        for (tick, expected) in &[
            // tick,   sqrt ratio (Q96)
            (0, "79228162514264337593543950336"),
            (MIN_TICK, "4295128739"),
            (
                MAX_TICK,
                "1461446703485210103287273052203988822378723970342",
            ),
        ] {
            assert_eq!(sqrt_ratio_at_tick(*tick).unwrap().to_string(), *expected);
        }
        let mut previous = U256::ZERO;
        for tick in [-50_000, -200, -1, 0, 1, 200, 50_000] {
            let ratio = sqrt_ratio_at_tick(tick).unwrap();
            assert!(ratio > previous);
            previous = ratio;
        }
        assert_eq!(
            sqrt_ratio_at_tick(MAX_TICK + 1),
            Err(MathError::TickOutOfRange(MAX_TICK + 1))
        );
    }

    #[test]
    fn test_active_tick_range() {
        for (tick, spacing, expected) in &[
            (-100, 200, (-200, 0)),
            (0, 60, (0, 60)),
            (59, 60, (0, 60)),
            (-1, 60, (-60, 0)),
            (5, 1, (5, 6)),
        ] {
            assert_eq!(active_tick_range(*tick, *spacing), *expected);
        }
    }

    fn state() -> (ConcentratedState, ConcentratedApprox) {
        let sqrt_price = sqrt_ratio_at_tick(-100).unwrap();
        let liquidity = 1_000_000_000_000_000_000_000_000_u128;
        let fee = BigDecimal::from_str("0.003").unwrap();
        (
            ConcentratedState::new(liquidity, sqrt_price, -100, 200, &fee, 18, 18).unwrap(),
            ConcentratedApprox::new(liquidity, sqrt_price, -100, 200, 0.003, 18, 18).unwrap(),
        )
    }

    #[test]
    fn test_swap_inside_range_matches_approx() {
        let (exact, approx) = state();
        let amount = BigDecimal::from(1000);
        for zero_for_one in [true, false] {
            let (consumed, out) = if zero_for_one {
                exact.swap_token0_in(&amount).unwrap()
            } else {
                exact.swap_token1_in(&amount).unwrap()
            };
            assert_eq!(consumed, amount);
            let expected = approx.swap(zero_for_one, 1000.0).unwrap();
            let out = decimal_to_f64(&out);
            assert!((out - expected).abs() / expected < 1e-9, "{out} vs {expected}");
            // slippage: never better than the marginal price
            assert!(out < 1000.0 * approx.price(zero_for_one));
        }
    }

    #[test]
    fn test_swap_is_clamped_to_active_range() {
        let (exact, approx) = state();
        let huge = BigDecimal::from(1_000_000_000_u64);
        for zero_for_one in [true, false] {
            let (consumed, out) = if zero_for_one {
                exact.swap_token0_in(&huge).unwrap()
            } else {
                exact.swap_token1_in(&huge).unwrap()
            };
            assert!(consumed < huge);
            let max_in = approx.max_in(zero_for_one);
            let max_out = approx.max_out(zero_for_one);
            assert!((decimal_to_f64(&consumed) - max_in).abs() / max_in < 1e-9);
            assert!((decimal_to_f64(&out) - max_out).abs() / max_out < 1e-6);
            assert!(approx.swap(zero_for_one, max_in * 1.01).is_none());
        }
    }
}
