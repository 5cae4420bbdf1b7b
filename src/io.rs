//! # Run input and output
//!
//! The JSON documents exchanged with the upstream parser and the downstream
//! transaction builder.

use std::collections::{BTreeMap, HashMap};

use alloy::primitives::U256;
use bigdecimal::BigDecimal;
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};

use crate::arb::context::Context;
use crate::arb::finder::FinderKind;
use crate::arb::math::carbon::CarbonOrder;
use crate::arb::pool::{Curve, CurveParams, ExchangeType};
use crate::arb::route::{Flashloan, RouteStruct};
use crate::arb::token::{Token, TokenId};
use crate::errors::ContainerError;

/// Snapshot of the market to search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Input {
    /// Finder to run, overriding the configured one
    #[serde(default)]
    pub mode: Option<FinderKind>,
    /// Opaque description of the triggering event, echoed to the logs
    #[serde(default)]
    pub event_info: serde_json::Value,
    /// Flashloan sources
    pub funding: Funding,
    /// Every token referenced by a curve
    pub tokens: Vec<Token>,
    /// Curves to search
    pub curves: Vec<PoolRecord>,
    /// Chain context
    pub context: ContextRecord,
}

/// Tokens that can be flashloaned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Funding {
    /// Flashloan fee per token, as a decimal string
    pub tokens: BTreeMap<TokenId, String>,
}

/// Chain context as found in the input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRecord {
    /// Native gas token
    pub gas_token: TokenId,
    /// Wrapped gas token
    pub wrapped_gas_token: TokenId,
    /// Reference stablecoin
    pub stablecoin: TokenId,
    /// Minimum profit in gas token units
    pub min_native_profit: BigDecimal,
}

impl ContextRecord {
    /// Builds the run context.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingContextToken` if a context token is not in `tokens`
    pub fn to_context(&self, tokens: &HashMap<TokenId, Token>) -> Result<Context> {
        Ok(Context::new(
            self.gas_token.clone(),
            self.wrapped_gas_token.clone(),
            self.stablecoin.clone(),
            self.min_native_profit.clone(),
            tokens,
        )?)
    }
}

/// Venue of a pool record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    /// Venue code
    #[serde(rename = "type")]
    pub exchange_type: ExchangeType,
    /// Venue name
    pub name: String,
}

/// One curve as found in the input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolRecord {
    /// Curve id, assigned from the insertion position when missing
    #[serde(default)]
    pub cid: Option<String>,
    /// Venue
    pub exchange: Exchange,
    /// First token
    pub tkn0: TokenId,
    /// Second token
    pub tkn1: TokenId,
    /// Fee as a decimal fraction
    pub fee: BigDecimal,
    /// Pricing parameters
    #[serde(flatten)]
    pub params: PoolParams,
}

/// Pricing parameters of a pool record, tagged by curve kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PoolParams {
    /// Reserves in wei
    ConstantProduct {
        /// Reserve of `tkn0`
        #[serde(with = "crate::utils::u256_string")]
        reserve0: U256,
        /// Reserve of `tkn1`
        #[serde(with = "crate::utils::u256_string")]
        reserve1: U256,
    },
    /// Active range of a concentrated-liquidity pool
    ConcentratedLiquidity {
        /// Active liquidity
        #[serde(with = "crate::utils::u256_string")]
        liquidity: U256,
        /// Current sqrt price, Q64.96
        #[serde(with = "crate::utils::u256_string")]
        sqrt_price_q96: U256,
        /// Current tick
        tick: i32,
        /// Tick spacing
        tick_spacing: i32,
    },
    /// A Carbon strategy
    Carbon {
        /// Order paying out `tkn0`
        order0: CarbonOrder,
        /// Order paying out `tkn1`
        order1: CarbonOrder,
    },
}

impl PoolRecord {
    /// Converts the record into a curve, resolving its tokens.
    ///
    /// # Errors
    ///
    /// * `ContainerError::UnknownToken` if a token is not in `tokens`
    /// * If the liquidity does not fit into `u128`
    /// * If the curve parameters are invalid, see `Curve::new`
    pub fn into_curve(self, tokens: &HashMap<TokenId, Token>) -> Result<Curve> {
        let cid = self.cid.unwrap_or_default();
        let resolve = |tkn: &TokenId| {
            tokens
                .get(tkn)
                .cloned()
                .ok_or_else(|| ContainerError::UnknownToken {
                    cid: cid.clone(),
                    token: tkn.clone(),
                })
        };
        let tkn0 = resolve(&self.tkn0)?;
        let tkn1 = resolve(&self.tkn1)?;
        let params = match self.params {
            PoolParams::ConstantProduct { reserve0, reserve1 } => {
                CurveParams::ConstantProduct { reserve0, reserve1 }
            }
            PoolParams::ConcentratedLiquidity {
                liquidity,
                sqrt_price_q96,
                tick,
                tick_spacing,
            } => CurveParams::ConcentratedLiquidity {
                liquidity: u128::try_from(liquidity)
                    .map_err(|_| eyre!("curve {cid}: liquidity {liquidity} exceeds uint128"))?,
                sqrt_price_q96,
                tick,
                tick_spacing,
            },
            PoolParams::Carbon { order0, order1 } => CurveParams::Carbon { order0, order1 },
        };
        Curve::new(
            cid,
            self.exchange.exchange_type,
            self.exchange.name,
            tkn0,
            tkn1,
            self.fee,
            params,
        )
    }
}

/// Result of a run, consumed by the transaction builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// Route profit in gas token units
    pub profit_gas_token: BigDecimal,
    /// Loans opening the route
    pub flashloans: Vec<Flashloan>,
    /// Route steps, empty when nothing beats the profit gate
    pub route: Vec<RouteStruct>,
}

impl Output {
    /// The "nothing profitable enough" result.
    #[must_use]
    pub fn empty(profit_gas_token: BigDecimal) -> Self {
        Self {
            profit_gas_token,
            flashloans: Vec::new(),
            route: Vec::new(),
        }
    }
}
