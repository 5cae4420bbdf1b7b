//! Curves: one tradeable liquidity source each.
//!
//! A `Curve` couples the venue it lives on (`ExchangeType`) with the typed pricing
//! parameters of its curve kind (`CurveParams`). It offers two views of the same state:
//! the exact view (`swap_exact`) used to produce wei-precise instructions, and the `f64`
//! transport view (`price`, `dtkn_out`, `max_in`, ...) used to search and size trades.

use std::fmt::{self, Debug, Display};

use alloy::primitives::U256;
use bigdecimal::BigDecimal;
use derive_more::Display as DeriveDisplay;
use eyre::{bail, Result};
use num_traits::{One, Signed, Zero};
use serde::{Deserialize, Serialize};

use super::container::Param;
use super::math::carbon::{self, CarbonApprox, CarbonOrder};
use super::math::concentrated::{ConcentratedApprox, ConcentratedState};
use super::math::{constant_product, decimal_to_f64, from_wei, u256_to_f64, MathError};
use super::pair::Pair;
use super::token::{Token, TokenId};
use crate::errors::CurveError;

/// The direction of a swap through a curve.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Direction {
    /// Swap from token0 to token1
    ZeroForOne,
    /// Swap from token1 to token0
    OneForZero,
}

impl Direction {
    /// Returns the opposite direction.
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::ZeroForOne => Self::OneForZero,
            Self::OneForZero => Self::ZeroForOne,
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Debug for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroForOne => write!(f, "0>1"),
            Self::OneForZero => write!(f, "1>0"),
        }
    }
}

/// The pricing model of a curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DeriveDisplay)]
pub enum CurveKind {
    /// `x * y = k`
    #[display("constant_product")]
    ConstantProduct,
    /// Range-bound liquidity priced by `sqrt_price`
    #[display("concentrated_liquidity")]
    ConcentratedLiquidity,
    /// Carbon style discretized orders
    #[display("discretized_order")]
    DiscretizedOrder,
}

/// The venue a curve trades on. The numeric codes are part of the route contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DeriveDisplay, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ExchangeType {
    /// Bancor V2 (code 0)
    BancorV2,
    /// Bancor V3 (code 1)
    BancorV3,
    /// Uniswap V2 (code 2)
    UniswapV2,
    /// Uniswap V3 (code 3)
    UniswapV3,
    /// Sushiswap V2 (code 4)
    SushiswapV2,
    /// Sushiswap (code 5)
    Sushiswap,
    /// Carbon V1 (code 6)
    CarbonV1,
}

impl ExchangeType {
    /// Returns the numeric code of the venue.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::BancorV2 => 0,
            Self::BancorV3 => 1,
            Self::UniswapV2 => 2,
            Self::UniswapV3 => 3,
            Self::SushiswapV2 => 4,
            Self::Sushiswap => 5,
            Self::CarbonV1 => 6,
        }
    }

    /// Returns the curve kind used to price trades on this venue.
    #[must_use]
    pub const fn curve_kind(self) -> CurveKind {
        match self {
            Self::UniswapV3 => CurveKind::ConcentratedLiquidity,
            Self::CarbonV1 => CurveKind::DiscretizedOrder,
            Self::BancorV2
            | Self::BancorV3
            | Self::UniswapV2
            | Self::SushiswapV2
            | Self::Sushiswap => CurveKind::ConstantProduct,
        }
    }
}

impl TryFrom<u8> for ExchangeType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => Self::BancorV2,
            1 => Self::BancorV3,
            2 => Self::UniswapV2,
            3 => Self::UniswapV3,
            4 => Self::SushiswapV2,
            5 => Self::Sushiswap,
            6 => Self::CarbonV1,
            _ => return Err(format!("unknown exchange type {code}")),
        })
    }
}

impl From<ExchangeType> for u8 {
    fn from(value: ExchangeType) -> Self {
        value.code()
    }
}

/// Typed pricing parameters, one variant per curve kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurveParams {
    /// Reserves in wei
    ConstantProduct {
        /// Reserve of token0
        reserve0: U256,
        /// Reserve of token1
        reserve1: U256,
    },
    /// Active-range state of a concentrated-liquidity pool
    ConcentratedLiquidity {
        /// Active liquidity
        liquidity: u128,
        /// Current sqrt price, Q64.96
        sqrt_price_q96: U256,
        /// Current tick
        tick: i32,
        /// Tick spacing of the pool
        tick_spacing: i32,
    },
    /// Two independent orders. `order0` sells token0, `order1` sells token1.
    Carbon {
        /// Order paying out token0
        order0: CarbonOrder,
        /// Order paying out token1
        order1: CarbonOrder,
    },
}

impl CurveParams {
    /// Returns the curve kind these parameters describe.
    #[must_use]
    pub const fn kind(&self) -> CurveKind {
        match self {
            Self::ConstantProduct { .. } => CurveKind::ConstantProduct,
            Self::ConcentratedLiquidity { .. } => CurveKind::ConcentratedLiquidity,
            Self::Carbon { .. } => CurveKind::DiscretizedOrder,
        }
    }
}

/// Cached `f64` state backing the transport view
#[derive(Debug, Clone, Copy)]
enum Approx {
    /// Reserves in token units
    ConstantProduct {
        /// Reserve of token0
        x0: f64,
        /// Reserve of token1
        x1: f64,
    },
    /// Concentrated-liquidity view
    Concentrated(ConcentratedApprox),
    /// One view per order, keyed by swap direction
    Carbon {
        /// token0 in, paid from `order1`
        zero_for_one: CarbonApprox,
        /// token1 in, paid from `order0`
        one_for_zero: CarbonApprox,
    },
}

/// One tradeable liquidity source. Immutable once built.
#[derive(Clone)]
pub struct Curve {
    /// Stable identifier, unique within a container
    pub cid: String,
    /// Venue the curve trades on
    pub exchange_type: ExchangeType,
    /// Human readable venue name
    pub exchange_name: String,
    /// First token
    pub tkn0: Token,
    /// Second token
    pub tkn1: Token,
    /// Swap fee as a fraction, e.g. `0.003`
    pub fee: BigDecimal,
    /// Typed pricing parameters
    pub params: CurveParams,
    /// Cached transport state
    approx: Approx,
    /// Fee as `f64`
    fee_f64: f64,
}

impl Curve {
    /// Creates a curve and precomputes its transport view.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters do not match the venue's curve kind, if both
    /// tokens are the same, if the fee is outside `[0, 1)` or if the parameters cannot be
    /// represented (e.g. a tick out of range).
    pub fn new(
        cid: impl Into<String>,
        exchange_type: ExchangeType,
        exchange_name: impl Into<String>,
        tkn0: Token,
        tkn1: Token,
        fee: BigDecimal,
        params: CurveParams,
    ) -> Result<Self> {
        let cid = cid.into();
        if exchange_type.curve_kind() != params.kind() {
            bail!(
                "curve {cid}: {exchange_type} expects {} parameters, got {}",
                exchange_type.curve_kind(),
                params.kind()
            );
        }
        if tkn0 == tkn1 {
            bail!("curve {cid}: both tokens are {}", tkn0.address);
        }
        if fee.is_negative() || fee >= BigDecimal::one() {
            bail!("curve {cid}: fee {fee} outside of [0, 1)");
        }

        let approx = Self::build_approx(&tkn0, &tkn1, &fee, &params)
            .map_err(|e| eyre::eyre!("curve {cid}: {e}"))?;
        Ok(Self {
            cid,
            exchange_type,
            exchange_name: exchange_name.into(),
            fee_f64: decimal_to_f64(&fee),
            tkn0,
            tkn1,
            fee,
            params,
            approx,
        })
    }

    /// Builds the cached `f64` view of the parameters
    fn build_approx(
        tkn0: &Token,
        tkn1: &Token,
        fee: &BigDecimal,
        params: &CurveParams,
    ) -> Result<Approx, MathError> {
        Ok(match params {
            CurveParams::ConstantProduct { reserve0, reserve1 } => Approx::ConstantProduct {
                x0: decimal_to_f64(&from_wei(*reserve0, tkn0.decimals)),
                x1: decimal_to_f64(&from_wei(*reserve1, tkn1.decimals)),
            },
            CurveParams::ConcentratedLiquidity {
                liquidity,
                sqrt_price_q96,
                tick,
                tick_spacing,
            } => Approx::Concentrated(ConcentratedApprox::new(
                *liquidity,
                *sqrt_price_q96,
                *tick,
                *tick_spacing,
                decimal_to_f64(fee),
                tkn0.decimals,
                tkn1.decimals,
            )?),
            CurveParams::Carbon { order0, order1 } => Approx::Carbon {
                zero_for_one: CarbonApprox::new(order1, fee, tkn0.decimals, tkn1.decimals)?,
                one_for_zero: CarbonApprox::new(order0, fee, tkn1.decimals, tkn0.decimals)?,
            },
        })
    }

    /// Returns the curve kind.
    #[must_use]
    pub const fn kind(&self) -> CurveKind {
        self.params.kind()
    }

    /// Whether the curve is a Carbon (discretized-order) curve.
    #[must_use]
    pub fn is_carbon(&self) -> bool {
        self.kind() == CurveKind::DiscretizedOrder
    }

    /// Constant-product curves can absorb any input; every other kind has a capacity.
    #[must_use]
    pub fn is_unlevered(&self) -> bool {
        self.kind() == CurveKind::ConstantProduct
    }

    /// Returns the pair in `tkn0/tkn1` order.
    #[must_use]
    pub fn pair(&self) -> Pair {
        Pair::new(self.tkn0.address.clone(), self.tkn1.address.clone())
    }

    /// Returns the primary (canonical direction) pair.
    #[must_use]
    pub fn primary(&self) -> Pair {
        Pair::primary(&self.tkn0, &self.tkn1)
    }

    /// Whether `tkn` is one of the curve's tokens.
    #[must_use]
    pub fn contains(&self, tkn: &TokenId) -> bool {
        &self.tkn0.address == tkn || &self.tkn1.address == tkn
    }

    /// Returns the curve's token with address `tkn`.
    #[must_use]
    pub fn token(&self, tkn: &TokenId) -> Option<&Token> {
        if &self.tkn0.address == tkn {
            Some(&self.tkn0)
        } else if &self.tkn1.address == tkn {
            Some(&self.tkn1)
        } else {
            None
        }
    }

    /// Returns the direction of a swap selling `tkn_in`.
    ///
    /// # Errors
    ///
    /// Returns `CurveError::TokenMismatch` if `tkn_in` is not one of the curve's tokens
    pub fn direction(&self, tkn_in: &TokenId) -> Result<Direction, CurveError> {
        if &self.tkn0.address == tkn_in {
            Ok(Direction::ZeroForOne)
        } else if &self.tkn1.address == tkn_in {
            Ok(Direction::OneForZero)
        } else {
            Err(CurveError::TokenMismatch {
                cid: self.cid.clone(),
                token: tkn_in.clone(),
            })
        }
    }

    /// Returns `(token in, token out)` for a direction.
    #[must_use]
    pub const fn tokens(&self, direction: Direction) -> (&Token, &Token) {
        match direction {
            Direction::ZeroForOne => (&self.tkn0, &self.tkn1),
            Direction::OneForZero => (&self.tkn1, &self.tkn0),
        }
    }

    /// Wraps a math failure with this curve's id
    fn math_error(&self, source: MathError) -> CurveError {
        CurveError::Math {
            cid: self.cid.clone(),
            source,
        }
    }

    /// Error for a trade into an empty side of the curve
    fn no_liquidity(&self) -> CurveError {
        CurveError::NoLiquidity {
            cid: self.cid.clone(),
        }
    }

    /// Simulates selling `amount_in` of `tkn_in` with exact arithmetic.
    ///
    /// Curves with a capacity may consume less than requested; the consumed amount is
    /// returned alongside the output. The output is raw: neither haircut nor quantized.
    ///
    /// # Arguments
    ///
    /// * `tkn_in` - The token sold, one of the curve's tokens
    /// * `amount_in` - Amount sold in token units
    ///
    /// # Returns
    ///
    /// `(amount_in consumed, amount_out)` in token units
    ///
    /// # Errors
    ///
    /// * `CurveError::TokenMismatch` if `tkn_in` is not one of the curve's tokens
    /// * `CurveError::NoLiquidity` if the paying side of the curve is empty
    /// * `CurveError::Math` if the curve math fails
    pub fn swap_exact(
        &self,
        tkn_in: &TokenId,
        amount_in: &BigDecimal,
    ) -> Result<(BigDecimal, BigDecimal), CurveError> {
        let direction = self.direction(tkn_in)?;
        let (token_in, token_out) = self.tokens(direction);

        match &self.params {
            CurveParams::ConstantProduct { reserve0, reserve1 } => {
                let (reserve_in, reserve_out) = match direction {
                    Direction::ZeroForOne => (reserve0, reserve1),
                    Direction::OneForZero => (reserve1, reserve0),
                };
                if reserve_out.is_zero() {
                    return Err(self.no_liquidity());
                }
                let amount_out = constant_product::swap_exact(
                    &from_wei(*reserve_in, token_in.decimals),
                    &from_wei(*reserve_out, token_out.decimals),
                    &self.fee,
                    amount_in,
                )
                .map_err(|e| self.math_error(e))?;
                Ok((amount_in.clone(), amount_out))
            }
            CurveParams::ConcentratedLiquidity {
                liquidity,
                sqrt_price_q96,
                tick,
                tick_spacing,
            } => {
                if *liquidity == 0 {
                    return Err(self.no_liquidity());
                }
                let state = ConcentratedState::new(
                    *liquidity,
                    *sqrt_price_q96,
                    *tick,
                    *tick_spacing,
                    &self.fee,
                    self.tkn0.decimals,
                    self.tkn1.decimals,
                )
                .map_err(|e| self.math_error(e))?;
                match direction {
                    Direction::ZeroForOne => state.swap_token0_in(amount_in),
                    Direction::OneForZero => state.swap_token1_in(amount_in),
                }
                .map_err(|e| self.math_error(e))
            }
            CurveParams::Carbon { order0, order1 } => {
                let order = match direction {
                    Direction::ZeroForOne => order1,
                    Direction::OneForZero => order0,
                };
                if order.y.is_zero() {
                    return Err(self.no_liquidity());
                }
                carbon::swap_exact(
                    order,
                    amount_in,
                    token_in.decimals,
                    token_out.decimals,
                    &self.fee,
                )
                .map_err(|e| self.math_error(e))
            }
        }
    }

    /// Marginal price in output tokens per input token, net of fee.
    #[must_use]
    pub fn price(&self, direction: Direction) -> f64 {
        match (&self.approx, direction) {
            (Approx::ConstantProduct { x0, x1 }, Direction::ZeroForOne) => {
                constant_product::price_approx(*x0, *x1, self.fee_f64)
            }
            (Approx::ConstantProduct { x0, x1 }, Direction::OneForZero) => {
                constant_product::price_approx(*x1, *x0, self.fee_f64)
            }
            (Approx::Concentrated(cl), _) => cl.price(direction == Direction::ZeroForOne),
            (Approx::Carbon { zero_for_one, .. }, Direction::ZeroForOne) => zero_for_one.price(),
            (Approx::Carbon { one_for_zero, .. }, Direction::OneForZero) => one_for_zero.price(),
        }
    }

    /// Mid price of token0 in token1, without fee.
    #[must_use]
    pub fn mid_price(&self) -> f64 {
        self.price(Direction::ZeroForOne) / (1.0 - self.fee_f64)
    }

    /// Output for selling `dx` in `direction`, or `None` if `dx` exceeds the capacity.
    #[must_use]
    pub fn dtkn_out(&self, direction: Direction, dx: f64) -> Option<f64> {
        match (&self.approx, direction) {
            (Approx::ConstantProduct { x0, x1 }, Direction::ZeroForOne) => {
                Some(constant_product::swap_approx(*x0, *x1, self.fee_f64, dx))
            }
            (Approx::ConstantProduct { x0, x1 }, Direction::OneForZero) => {
                Some(constant_product::swap_approx(*x1, *x0, self.fee_f64, dx))
            }
            (Approx::Concentrated(cl), _) => cl.swap(direction == Direction::ZeroForOne, dx),
            (Approx::Carbon { zero_for_one, .. }, Direction::ZeroForOne) => zero_for_one.swap(dx),
            (Approx::Carbon { one_for_zero, .. }, Direction::OneForZero) => one_for_zero.swap(dx),
        }
    }

    /// Largest input the curve can absorb in `direction`, `None` when unlevered.
    #[must_use]
    pub fn max_in(&self, direction: Direction) -> Option<f64> {
        match (&self.approx, direction) {
            (Approx::ConstantProduct { .. }, _) => None,
            (Approx::Concentrated(cl), _) => Some(cl.max_in(direction == Direction::ZeroForOne)),
            (Approx::Carbon { zero_for_one, .. }, Direction::ZeroForOne) => {
                Some(zero_for_one.max_in())
            }
            (Approx::Carbon { one_for_zero, .. }, Direction::OneForZero) => {
                Some(one_for_zero.max_in())
            }
        }
    }

    /// Output when the capacity in `direction` is exhausted. For constant-product curves
    /// this is the reserve of the output token.
    #[must_use]
    pub fn max_out(&self, direction: Direction) -> f64 {
        match (&self.approx, direction) {
            (Approx::ConstantProduct { x1, .. }, Direction::ZeroForOne) => *x1,
            (Approx::ConstantProduct { x0, .. }, Direction::OneForZero) => *x0,
            (Approx::Concentrated(cl), _) => cl.max_out(direction == Direction::ZeroForOne),
            (Approx::Carbon { zero_for_one, .. }, Direction::ZeroForOne) => {
                zero_for_one.max_out()
            }
            (Approx::Carbon { one_for_zero, .. }, Direction::OneForZero) => {
                one_for_zero.max_out()
            }
        }
    }

    /// Amount of `tkn` the curve can pay out, in token units. Zero for foreign tokens.
    #[must_use]
    pub fn holdings(&self, tkn: &TokenId) -> f64 {
        let Ok(direction) = self.direction(tkn) else {
            return 0.0;
        };
        // tokens held are paid out by the opposite direction
        let paying = direction.reversed();
        match (&self.approx, paying) {
            (Approx::ConstantProduct { x0, .. }, Direction::OneForZero) => *x0,
            (Approx::ConstantProduct { x1, .. }, Direction::ZeroForOne) => *x1,
            (Approx::Concentrated(cl), _) => cl.max_out(paying == Direction::ZeroForOne),
            (Approx::Carbon { zero_for_one, .. }, Direction::ZeroForOne) => {
                zero_for_one.holdings()
            }
            (Approx::Carbon { one_for_zero, .. }, Direction::OneForZero) => {
                one_for_zero.holdings()
            }
        }
    }

    /// Numeric value of a parameter, `None` if the curve kind does not have it.
    #[must_use]
    pub fn param(&self, param: Param) -> Option<f64> {
        match (param, &self.params) {
            (Param::Fee, _) => Some(self.fee_f64),
            (Param::MidPrice, _) => Some(self.mid_price()),
            (Param::Holdings0, _) => Some(self.holdings(&self.tkn0.address)),
            (Param::Holdings1, _) => Some(self.holdings(&self.tkn1.address)),
            (Param::Reserve0, CurveParams::ConstantProduct { reserve0, .. }) => {
                Some(u256_to_f64(*reserve0))
            }
            (Param::Reserve1, CurveParams::ConstantProduct { reserve1, .. }) => {
                Some(u256_to_f64(*reserve1))
            }
            (Param::Liquidity, CurveParams::ConcentratedLiquidity { liquidity, .. }) => {
                #[allow(clippy::cast_precision_loss)]
                let liquidity = *liquidity as f64;
                Some(liquidity)
            }
            (Param::Tick, CurveParams::ConcentratedLiquidity { tick, .. }) => {
                Some(f64::from(*tick))
            }
            (Param::Y0, CurveParams::Carbon { order0, .. }) => Some(u256_to_f64(order0.y)),
            (Param::Y1, CurveParams::Carbon { order1, .. }) => Some(u256_to_f64(order1.y)),
            _ => None,
        }
    }
}

impl Debug for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Curve({}, {} {:?}/{:?}, fee {})",
            self.cid, self.exchange_type, self.tkn0, self.tkn1, self.fee
        )
    }
}

impl Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} {}/{}", self.cid, self.exchange_name, self.tkn0, self.tkn1)
    }
}
