use bigdecimal::BigDecimal;
use num_traits::{One, Zero};

use super::MathError;

/// Output of a constant-product swap in token units.
///
/// `amount_out = y - x*y / (x + amount_in*(1-fee))`, with `x`/`y` the reserves of the
/// input/output token already scaled to token units.
///
/// # Errors
///
/// Returns `MathError::DivisionByZero` if the input reserve is empty and nothing is
/// being swapped in
pub fn swap_exact(
    reserve_in: &BigDecimal,
    reserve_out: &BigDecimal,
    fee: &BigDecimal,
    amount_in: &BigDecimal,
) -> Result<BigDecimal, MathError> {
    let amount_in_net = amount_in * (BigDecimal::one() - fee);
    let denominator = reserve_in + &amount_in_net;
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero("constant_product::swap_exact"));
    }
    Ok(reserve_out - reserve_in * reserve_out / denominator)
}

/// Floating point version of `swap_exact`.
#[must_use]
pub fn swap_approx(reserve_in: f64, reserve_out: f64, fee: f64, amount_in: f64) -> f64 {
    let amount_in_net = amount_in * (1.0 - fee);
    reserve_out * amount_in_net / (reserve_in + amount_in_net)
}

/// Marginal price in output tokens per input token, net of fee.
#[must_use]
pub fn price_approx(reserve_in: f64, reserve_out: f64, fee: f64) -> f64 {
    if reserve_in <= 0.0 {
        return 0.0;
    }
    reserve_out / reserve_in * (1.0 - fee)
}
