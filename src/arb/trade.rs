//! # Trade instructions
//!
//! Wei-precise building blocks of a route. An instruction is either a single `Hop`
//! through one curve or an `AggregatedHop` bundling several Carbon hops over the same
//! directed pair. Aggregates own plain hops only, so they never nest.

use std::fmt::{self, Debug};
use std::sync::Arc;

use alloy::primitives::U256;
use bigdecimal::{BigDecimal, FromPrimitive, Zero};

use super::context::Context;
use super::finder::Opportunity;
use super::math::{quantize, to_wei};
use super::pool::Curve;
use super::token::{Token, TokenId};
use crate::errors::CurveError;

/// An amount of one token, truncated to the token's decimals.
#[derive(Clone, PartialEq, Eq)]
pub struct TradeMovement {
    /// Token moved
    pub token: Token,
    /// Quantized amount in token units
    amount: BigDecimal,
}

impl TradeMovement {
    /// Creates a movement, truncating `amount` to the token's granularity.
    #[must_use]
    pub fn new(token: Token, amount: &BigDecimal) -> Self {
        let amount = quantize(amount, token.decimals);
        Self { token, amount }
    }

    /// Amount in token units.
    #[must_use]
    pub const fn amount(&self) -> &BigDecimal {
        &self.amount
    }

    /// Amount in wei, `floor(amount * 10^decimals)`.
    #[must_use]
    pub fn wei_amount(&self) -> U256 {
        to_wei(&self.amount, self.token.decimals)
    }

    /// The same token with another amount.
    #[must_use]
    pub fn with_amount(&self, amount: &BigDecimal) -> Self {
        Self::new(self.token.clone(), amount)
    }
}

impl Debug for TradeMovement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.token)
    }
}

/// One trade through one curve.
#[derive(Clone)]
pub struct Hop {
    /// Curve traded
    pub curve: Arc<Curve>,
    /// Amount sold
    pub input: TradeMovement,
    /// Amount bought
    pub output: TradeMovement,
}

impl Hop {
    /// Creates a hop, checking that both tokens trade on the curve.
    ///
    /// The gas token and its wrapped form are interchangeable when matching tokens.
    ///
    /// # Errors
    ///
    /// Returns `CurveError::TokenMismatch` if a token is not one of the curve's tokens,
    /// or if both movements resolve to the same curve token
    pub fn new(
        curve: Arc<Curve>,
        input: TradeMovement,
        output: TradeMovement,
        context: &Context,
    ) -> Result<Self, CurveError> {
        let mismatch = |token: &Token| CurveError::TokenMismatch {
            cid: curve.cid.clone(),
            token: token.address.clone(),
        };
        let tkn_in = context
            .curve_token(&curve, &input.token.address)
            .ok_or_else(|| mismatch(&input.token))?;
        let tkn_out = context
            .curve_token(&curve, &output.token.address)
            .ok_or_else(|| mismatch(&output.token))?;
        if tkn_in == tkn_out {
            return Err(mismatch(&output.token));
        }
        Ok(Self {
            curve,
            input,
            output,
        })
    }

    /// Whether the hop trades a Carbon curve.
    #[must_use]
    pub fn is_carbon(&self) -> bool {
        self.curve.is_carbon()
    }
}

impl Debug for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?} -> {:?}", self.curve.cid, self.input, self.output)
    }
}

/// Several hops over the same directed pair, traded as one instruction.
#[derive(Clone)]
pub struct AggregatedHop {
    /// The bundled hops, in order
    hops: Vec<Hop>,
    /// Sum of the hops' inputs
    input: TradeMovement,
    /// Sum of the hops' outputs
    output: TradeMovement,
}

impl AggregatedHop {
    /// Bundles hops, summing their amounts. Returns `None` for an empty list.
    #[must_use]
    pub fn new(hops: Vec<Hop>) -> Option<Self> {
        let first = hops.first()?;
        let total_in: BigDecimal = hops.iter().map(|h| h.input.amount()).sum();
        let total_out: BigDecimal = hops.iter().map(|h| h.output.amount()).sum();
        let input = first.input.with_amount(&total_in);
        let output = first.output.with_amount(&total_out);
        Some(Self {
            hops,
            input,
            output,
        })
    }

    /// The bundled hops.
    #[must_use]
    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    /// Curve of the first hop, which stands for the whole bundle.
    #[must_use]
    pub fn curve(&self) -> &Arc<Curve> {
        // never empty, see `new`
        &self.hops[0].curve
    }
}

impl Debug for AggregatedHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} -> {:?} over {:?}", self.input, self.output, self.hops)
    }
}

/// One step of a route.
#[derive(Debug, Clone)]
pub enum TradeInstruction {
    /// A single hop
    Hop(Hop),
    /// A bundle of Carbon hops
    Aggregated(AggregatedHop),
}

impl TradeInstruction {
    /// Curve traded (the first sub-hop's curve for aggregates).
    #[must_use]
    pub fn curve(&self) -> &Arc<Curve> {
        match self {
            Self::Hop(hop) => &hop.curve,
            Self::Aggregated(aggregated) => aggregated.curve(),
        }
    }

    /// Total amount sold.
    #[must_use]
    pub const fn input(&self) -> &TradeMovement {
        match self {
            Self::Hop(hop) => &hop.input,
            Self::Aggregated(aggregated) => &aggregated.input,
        }
    }

    /// Total amount bought.
    #[must_use]
    pub const fn output(&self) -> &TradeMovement {
        match self {
            Self::Hop(hop) => &hop.output,
            Self::Aggregated(aggregated) => &aggregated.output,
        }
    }

    /// Sub-hops of an aggregate, empty for a single hop.
    #[must_use]
    pub fn aggregated_from(&self) -> &[Hop] {
        match self {
            Self::Hop(_) => &[],
            Self::Aggregated(aggregated) => aggregated.hops(),
        }
    }

    /// Whether the instruction trades Carbon curves.
    #[must_use]
    pub fn is_carbon(&self) -> bool {
        self.curve().is_carbon()
    }

    /// Converts the approximate hops of an opportunity into instructions.
    ///
    /// # Errors
    ///
    /// Returns `CurveError::TokenMismatch` if a hop's tokens do not trade on its curve
    pub fn from_opportunity(
        opportunity: &Opportunity,
        context: &Context,
    ) -> Result<Vec<Self>, CurveError> {
        opportunity
            .hops
            .iter()
            .map(|hop| {
                let curve = &hop.curve;
                let token = |tkn: &TokenId| {
                    curve.token(tkn).cloned().ok_or_else(|| CurveError::TokenMismatch {
                        cid: curve.cid.clone(),
                        token: tkn.clone(),
                    })
                };
                let input = TradeMovement::new(token(&hop.tkn_in)?, &f64_to_decimal(hop.amount_in));
                let output =
                    TradeMovement::new(token(&hop.tkn_out)?, &f64_to_decimal(hop.amount_out));
                Hop::new(Arc::clone(curve), input, output, context).map(Self::Hop)
            })
            .collect()
    }
}

/// Exact decimal of a finite `f64`, zero otherwise
fn f64_to_decimal(value: f64) -> BigDecimal {
    BigDecimal::from_f64(value).unwrap_or_else(BigDecimal::zero)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use num_bigint::BigInt;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::arb::test_helpers::*;

    #[test]
    fn test_movement_is_quantized() {
        for (amount, decimals, expected, wei) in [
            ("1.2345678", 6, "1.234567", 1_234_567_u128),
            ("0.0000001", 6, "0", 0),
            ("3", 18, "3", 3_000_000_000_000_000_000),
            ("0.1", 18, "0.1", 100_000_000_000_000_000),
        ] {
            let movement =
                TradeMovement::new(token("T", decimals), &BigDecimal::from_str(amount).unwrap());
            assert_eq!(movement.amount(), &BigDecimal::from_str(expected).unwrap());
            assert_eq!(movement.wei_amount(), U256::from(wei));
            let again = movement.with_amount(movement.amount());
            assert_eq!(again, movement);
        }
    }

    #[test]
    fn test_random_movements_truncate_to_wei() {
        let mut rng = StdRng::seed_from_u64(0x0071_ade5);
        for _ in 0..1000 {
            let mantissa = rng.random_range(0..1_000_000_000_000_000_000_u128);
            let scale = rng.random_range(0..=30_u32);
            let decimals = rng.random_range(0..=18_u8);
            let amount = BigDecimal::new(BigInt::from(mantissa), i64::from(scale));
            let movement = TradeMovement::new(token("T", decimals), &amount);

            let shift = u32::from(decimals);
            let wei = if shift >= scale {
                mantissa * 10_u128.pow(shift - scale)
            } else {
                mantissa / 10_u128.pow(scale - shift)
            };
            assert_eq!(movement.wei_amount(), U256::from(wei), "{amount} at {decimals}");
            assert_eq!(&quantize(movement.amount(), decimals), movement.amount());
            assert!(movement.amount() <= &amount);
        }
    }

    #[test]
    fn test_hop_checks_tokens() {
        let ctx = context();
        let curve = Arc::new(cp_curve("1", ("ETH", 18), ("USDC", 6), 10, 30_000, "0.003"));
        let weth = TradeMovement::new(token("WETH", 18), &BigDecimal::from(1));
        let usdc = TradeMovement::new(token("USDC", 6), &BigDecimal::from(3000));
        let dai = TradeMovement::new(token("DAI", 18), &BigDecimal::from(3000));

        // WETH stands in for ETH
        assert!(Hop::new(Arc::clone(&curve), weth.clone(), usdc.clone(), &ctx).is_ok());
        assert_eq!(
            Hop::new(Arc::clone(&curve), weth, dai, &ctx).unwrap_err(),
            CurveError::TokenMismatch {
                cid: "1".to_string(),
                token: TokenId::from("DAI"),
            }
        );
        assert!(Hop::new(curve, usdc.clone(), usdc, &ctx).is_err());
    }

    #[test]
    fn test_aggregate_sums_amounts() {
        let hops = vec![
            usdc_weth_hop("1", "1000", "0.3"),
            usdc_weth_hop("2", "500.5", "0.15"),
        ];
        let aggregated = AggregatedHop::new(hops).unwrap();
        assert_eq!(aggregated.input.amount(), &BigDecimal::from_str("1500.5").unwrap());
        assert_eq!(aggregated.output.amount(), &BigDecimal::from_str("0.45").unwrap());
        assert_eq!(aggregated.curve().cid, "1");

        let instruction = TradeInstruction::Aggregated(aggregated);
        assert!(instruction.is_carbon());
        assert_eq!(instruction.aggregated_from().len(), 2);
        assert!(AggregatedHop::new(Vec::new()).is_none());
    }
}
