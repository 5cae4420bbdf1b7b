//! # Route handler
//!
//! Turns the approximate trade instructions of an opportunity into the wei-precise
//! route handed to the arbitrage contract:
//!
//! 1. consecutive Carbon hops over the same directed pair are bundled;
//! 2. every hop is re-simulated with exact curve math, feeding each output forward;
//! 3. Bancor V3 two-hop trades through the hub token are merged;
//! 4. the flashloan and the profit are derived from the final instructions;
//! 5. one route struct is emitted per instruction.

use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::U256;
use alloy::sol;
use alloy::sol_types::SolValue;
use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::context::Context;
use super::math::{quantize, safety_haircut};
use super::pool::{Curve, ExchangeType};
use super::token::{Token, TokenId};
use super::trade::{AggregatedHop, Hop, TradeInstruction, TradeMovement};
use crate::errors::{CurveError, RouteError};

sol! {
    /// One Carbon strategy filled by a route step.
    struct TradeAction {
        uint256 strategyId;
        uint128 amount;
    }
}

/// Amount of a Carbon strategy traded within one route step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarbonTrade {
    /// Strategy id, the Carbon curve's cid
    pub strategy_id: String,
    /// Source amount in wei
    #[serde(with = "crate::utils::u256_string")]
    pub amount: U256,
}

/// Venue specific data of a route step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Extras {
    /// Strategies filled on a Carbon step
    Carbon(Vec<CarbonTrade>),
    /// Uniswap V3 fee tier in parts per million
    FeePpm(u32),
    /// No extra data
    None,
}

/// One step of the route, laid out like the contract's route struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStruct {
    /// Curve traded
    pub cid: String,
    /// Venue code
    pub exchange_type: ExchangeType,
    /// Venue name
    pub exchange_name: String,
    /// Token sold
    pub source_token: TokenId,
    /// Token bought
    pub target_token: TokenId,
    /// Amount sold in wei, zero to spend the full balance
    #[serde(with = "crate::utils::u256_string")]
    pub source_amount: U256,
    /// Minimum amount bought in wei
    #[serde(with = "crate::utils::u256_string")]
    pub min_target_amount: U256,
    /// Unix deadline, unset by this crate
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub deadline: Option<u64>,
    /// Venue specific data
    pub extras: Extras,
}

/// Token and amount to borrow for the route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashloan {
    /// Token borrowed
    pub token: TokenId,
    /// Amount borrowed in wei
    #[serde(with = "crate::utils::u256_string")]
    pub amount: U256,
}

/// Everything the route handler derives from a list of instructions.
#[derive(Debug, Clone)]
pub struct RouteResult {
    /// Final, simulated instructions
    pub instructions: Vec<TradeInstruction>,
    /// Loans opening the route
    pub flashloans: Vec<Flashloan>,
    /// Profit in the flashloan token
    pub profit: BigDecimal,
    /// Route structs, ready for encoding
    pub route: Vec<RouteStruct>,
}

/// Converts trade instructions into a contract route.
#[derive(Debug, Clone)]
pub struct TxRouteHandler<'a> {
    /// Instructions in trade order
    instructions: Vec<TradeInstruction>,
    /// Run context
    context: &'a Context,
    /// Hub token of the Bancor V3 venue
    bancor_v3_hub: TokenId,
    /// Whether any instruction trades a Carbon curve
    pub contains_carbon: bool,
}

impl<'a> TxRouteHandler<'a> {
    /// Creates a route handler.
    ///
    /// # Errors
    ///
    /// * `RouteError::NoInstructions` if `instructions` is empty
    /// * `RouteError::TooFewInstructions` if there is a single instruction
    pub fn new(
        instructions: Vec<TradeInstruction>,
        context: &'a Context,
        bancor_v3_hub: TokenId,
    ) -> Result<Self, RouteError> {
        match instructions.len() {
            0 => return Err(RouteError::NoInstructions),
            1 => return Err(RouteError::TooFewInstructions(1)),
            _ => {}
        }
        let contains_carbon = instructions.iter().any(TradeInstruction::is_carbon);
        Ok(Self {
            instructions,
            context,
            bancor_v3_hub,
            contains_carbon,
        })
    }

    /// Runs the whole pipeline on the handler's instructions.
    ///
    /// # Errors
    ///
    /// Returns the first `CurveError` raised by the exact simulation. The opportunity
    /// is infeasible against the current curve state.
    pub fn run(&self) -> Result<RouteResult, CurveError> {
        let aggregated = Self::aggregate_carbon_trades(self.instructions.clone());
        let calculated = self.calculate_trade_outputs(&aggregated)?;
        let instructions = self.aggregate_bancor_v3_trades(calculated);
        let flashloans = self.flashloans(&instructions);
        let profit = Self::calculate_trade_profit(&instructions);
        let mut route = Self::route_structs(&instructions);
        maximize_last_trade_per_tkn(&mut route);
        info!(
            "route over {} steps, profit {profit} {}",
            route.len(),
            instructions
                .first()
                .map_or_else(String::new, |i| i.input().token.symbol.clone())
        );
        Ok(RouteResult {
            instructions,
            flashloans,
            profit,
            route,
        })
    }

    /// Bundles consecutive Carbon instructions over the same directed pair.
    ///
    /// Every Carbon instruction comes out as an aggregate, a lone one bundling only
    /// itself. Other instructions pass through unchanged.
    #[must_use]
    pub fn aggregate_carbon_trades(instructions: Vec<TradeInstruction>) -> Vec<TradeInstruction> {
        let mut groups: Vec<Vec<TradeInstruction>> = Vec::new();
        for instruction in instructions {
            if instruction.is_carbon() {
                if let Some(group) = groups.last_mut() {
                    let joins = group.last().is_some_and(|previous| {
                        previous.is_carbon()
                            && previous.input().token == instruction.input().token
                            && previous.output().token == instruction.output().token
                    });
                    if joins {
                        group.push(instruction);
                        continue;
                    }
                }
            }
            groups.push(vec![instruction]);
        }

        groups
            .into_iter()
            .filter_map(|group| {
                if !group.first()?.is_carbon() {
                    return group.into_iter().next();
                }
                let hops = group
                    .into_iter()
                    .flat_map(|instruction| match instruction {
                        TradeInstruction::Hop(hop) => vec![hop],
                        TradeInstruction::Aggregated(aggregated) => aggregated.hops().to_vec(),
                    })
                    .collect();
                AggregatedHop::new(hops).map(TradeInstruction::Aggregated)
            })
            .collect()
    }

    /// Simulates `amount_in` of `input` through `curve`, with the safety haircut on
    /// the output. Both amounts are quantized.
    fn solve(
        &self,
        curve: &Arc<Curve>,
        input: &Token,
        output: &Token,
        amount_in: &BigDecimal,
    ) -> Result<(TradeMovement, TradeMovement), CurveError> {
        let curve_token = |token: &Token| {
            self.context
                .curve_token(curve, &token.address)
                .ok_or_else(|| CurveError::TokenMismatch {
                    cid: curve.cid.clone(),
                    token: token.address.clone(),
                })
        };
        let tkn_in = curve_token(input)?;
        curve_token(output)?;

        let (consumed, amount_out) = curve.swap_exact(&tkn_in.address, amount_in)?;
        let input = TradeMovement::new(input.clone(), &consumed);
        let output = TradeMovement::new(output.clone(), &(amount_out * safety_haircut()));
        debug!("{}: {:?} -> {:?}", curve.cid, input, output);
        Ok((input, output))
    }

    /// Re-simulates every instruction with exact math, feeding outputs forward.
    ///
    /// The first instruction's input opens the chain. Aggregates split the incoming
    /// amount across their hops in proportion to each hop's share of the aggregate's
    /// original input; the last hop takes whatever is left. Instructions with a
    /// non-positive input are dropped, as are hops whose input rounds to zero wei.
    ///
    /// # Errors
    ///
    /// Returns the first `CurveError` of the simulation
    pub fn calculate_trade_outputs(
        &self,
        instructions: &[TradeInstruction],
    ) -> Result<Vec<TradeInstruction>, CurveError> {
        let Some(first) = instructions.first() else {
            return Ok(Vec::new());
        };
        let mut next_amount_in = first.input().amount().clone();
        let mut calculated = Vec::with_capacity(instructions.len());

        for instruction in instructions {
            if instruction.input().amount() <= &BigDecimal::zero() {
                warn!("dropping instruction without input: {instruction:?}");
                continue;
            }
            let tkn_in = &instruction.input().token;
            let tkn_out = &instruction.output().token;
            match instruction {
                TradeInstruction::Hop(hop) => {
                    let (input, output) = self.solve(&hop.curve, tkn_in, tkn_out, &next_amount_in)?;
                    next_amount_in = output.amount().clone();
                    calculated.push(TradeInstruction::Hop(Hop {
                        curve: Arc::clone(&hop.curve),
                        input,
                        output,
                    }));
                }
                TradeInstruction::Aggregated(aggregated) => {
                    let hops = self.split_aggregate(aggregated, tkn_in, tkn_out, &next_amount_in)?;
                    let Some(aggregated) = AggregatedHop::new(hops) else {
                        warn!("no hop of {instruction:?} could be filled");
                        next_amount_in = BigDecimal::zero();
                        continue;
                    };
                    let instruction = TradeInstruction::Aggregated(aggregated);
                    next_amount_in = instruction.output().amount().clone();
                    calculated.push(instruction);
                }
            }
        }
        Ok(calculated)
    }

    /// Spreads `amount_in` over the hops of an aggregate and simulates each hop
    fn split_aggregate(
        &self,
        aggregated: &AggregatedHop,
        tkn_in: &Token,
        tkn_out: &Token,
        amount_in: &BigDecimal,
    ) -> Result<Vec<Hop>, CurveError> {
        let expected_in = aggregated.hops().iter().map(|h| h.input.amount()).sum::<BigDecimal>();
        let mut remaining = amount_in.clone();
        let mut solved: Vec<Hop> = Vec::with_capacity(aggregated.hops().len());
        let last = aggregated.hops().len().saturating_sub(1);

        for (index, hop) in aggregated.hops().iter().enumerate() {
            let share = if expected_in.is_zero() {
                BigDecimal::zero()
            } else {
                hop.input.amount() / &expected_in
            };
            let mut amount = amount_in * share;
            if amount > remaining || (index == last && amount < remaining) {
                amount = remaining.clone();
            }

            let (input, output) = self.solve(&hop.curve, tkn_in, tkn_out, &amount)?;
            remaining -= input.amount();
            if input.wei_amount().is_zero() {
                debug!("{}: input rounds to zero wei, skipped", hop.curve.cid);
            } else {
                solved.push(Hop {
                    curve: Arc::clone(&hop.curve),
                    input,
                    output,
                });
            }
            remaining = quantize(&remaining, tkn_in.decimals);

            if index == last && remaining > BigDecimal::zero() {
                self.redistribute(&mut solved, &mut remaining, tkn_in, tkn_out)?;
            }
        }
        Ok(solved)
    }

    /// Pushes a leftover input into the already solved hops, last hop first.
    ///
    /// A hop is only re-solved if the leftover would not turn negative; hops that
    /// would are skipped.
    fn redistribute(
        &self,
        solved: &mut [Hop],
        remaining: &mut BigDecimal,
        tkn_in: &Token,
        tkn_out: &Token,
    ) -> Result<(), CurveError> {
        for index in (0..solved.len()).rev() {
            let previous_in = solved[index].input.amount().clone();
            let adjusted = &previous_in + &*remaining;
            let curve = Arc::clone(&solved[index].curve);
            let (input, output) = self.solve(&curve, tkn_in, tkn_out, &adjusted)?;

            let test_remaining = &*remaining - input.amount() + &previous_in;
            if test_remaining < BigDecimal::zero() {
                continue;
            }
            *remaining = quantize(&test_remaining, tkn_in.decimals);
            debug!("{}: absorbed leftover, {} left", curve.cid, remaining);
            solved[index] = Hop {
                curve,
                input,
                output,
            };
            if remaining.is_zero() {
                break;
            }
        }
        Ok(())
    }

    /// Merges Bancor V3 trades `A -> hub -> B` into a single `A -> B` step.
    #[must_use]
    pub fn aggregate_bancor_v3_trades(
        &self,
        instructions: Vec<TradeInstruction>,
    ) -> Vec<TradeInstruction> {
        let mut merged: Vec<TradeInstruction> = Vec::with_capacity(instructions.len());
        for instruction in instructions {
            if let Some(TradeInstruction::Hop(previous)) = merged.last() {
                let through_hub = previous.curve.exchange_type == ExchangeType::BancorV3
                    && instruction.curve().exchange_type == ExchangeType::BancorV3
                    && previous.output.token.address == self.bancor_v3_hub
                    && instruction.input().token.address == self.bancor_v3_hub;
                if through_hub {
                    let combined = Hop {
                        curve: Arc::clone(&previous.curve),
                        input: previous.input.clone(),
                        output: instruction.output().clone(),
                    };
                    debug!("merged Bancor V3 hops into {combined:?}");
                    merged.pop();
                    merged.push(TradeInstruction::Hop(combined));
                    continue;
                }
            }
            merged.push(instruction);
        }
        merged
    }

    /// The loan opening the route: the first instruction's input.
    ///
    /// A wrapped gas token input is borrowed as the native token when the first curve
    /// trades the native token.
    #[must_use]
    pub fn flashloans(&self, instructions: &[TradeInstruction]) -> Vec<Flashloan> {
        let Some(first) = instructions.first() else {
            return Vec::new();
        };
        let input = first.input();
        let token = if first.curve().contains(&self.context.gas_token) {
            self.context.wrapped_to_native(&input.token.address)
        } else {
            input.token.address.clone()
        };
        vec![Flashloan {
            token,
            amount: input.wei_amount(),
        }]
    }

    /// Profit in the flashloan token: everything it receives minus everything it pays.
    #[must_use]
    pub fn calculate_trade_profit(instructions: &[TradeInstruction]) -> BigDecimal {
        let Some(first) = instructions.first() else {
            return BigDecimal::zero();
        };
        let flt = &first.input().token.address;
        let (mut sum_in, mut sum_out) = (BigDecimal::zero(), BigDecimal::zero());
        for instruction in instructions {
            if &instruction.input().token.address == flt {
                sum_in += instruction.input().amount().abs();
            } else if &instruction.output().token.address == flt {
                sum_out += instruction.output().amount().abs();
            }
        }
        sum_out - sum_in
    }

    /// Emits one route struct per instruction.
    #[must_use]
    pub fn route_structs(instructions: &[TradeInstruction]) -> Vec<RouteStruct> {
        instructions
            .iter()
            .map(|instruction| {
                let curve = instruction.curve();
                let extras = match curve.exchange_type {
                    ExchangeType::CarbonV1 => {
                        let trades = match instruction {
                            TradeInstruction::Hop(hop) => vec![carbon_trade(hop)],
                            TradeInstruction::Aggregated(aggregated) => {
                                aggregated.hops().iter().map(carbon_trade).collect()
                            }
                        };
                        Extras::Carbon(trades)
                    }
                    ExchangeType::UniswapV3 => {
                        fee_ppm(&curve.fee).map_or(Extras::None, Extras::FeePpm)
                    }
                    _ => Extras::None,
                };
                RouteStruct {
                    cid: curve.cid.clone(),
                    exchange_type: curve.exchange_type,
                    exchange_name: curve.exchange_name.clone(),
                    source_token: instruction.input().token.address.clone(),
                    target_token: instruction.output().token.address.clone(),
                    source_amount: instruction.input().wei_amount(),
                    min_target_amount: instruction.output().wei_amount(),
                    deadline: None,
                    extras,
                }
            })
            .collect()
    }
}

/// Extras entry of one Carbon hop
fn carbon_trade(hop: &Hop) -> CarbonTrade {
    CarbonTrade {
        strategy_id: hop.curve.cid.clone(),
        amount: hop.input.wei_amount(),
    }
}

/// Fee as an integer number of parts per million
fn fee_ppm(fee: &BigDecimal) -> Option<u32> {
    (fee * BigDecimal::from(1_000_000)).with_scale(0).to_u32()
}

/// Zeroes the source amount of the last trade of every token but the opening one, so
/// the contract spends its whole balance of that token.
pub fn maximize_last_trade_per_tkn(route: &mut [RouteStruct]) {
    let Some(first) = route.first() else {
        return;
    };
    let mut traded = vec![first.source_token.clone()];
    for step in route.iter_mut().rev() {
        if traded.contains(&step.source_token) {
            continue;
        }
        traded.push(step.source_token.clone());
        step.source_amount = U256::ZERO;
    }
}

/// ABI-encodes the Carbon trades of a route step as
/// `(uint32 32, uint32 n, (uint256 strategyId, uint128 amount)...)`, hex with `0x`.
///
/// Steps without Carbon trades encode as `"0x"`.
///
/// # Errors
///
/// * `RouteError::InvalidStrategyId` if a strategy id is not a decimal uint256
/// * `RouteError::AmountOverflow` if an amount does not fit into uint128
pub fn custom_data(extras: &Extras) -> Result<String, RouteError> {
    let Extras::Carbon(trades) = extras else {
        return Ok("0x".to_string());
    };
    let count = u32::try_from(trades.len())
        .map_err(|_| RouteError::AmountOverflow(trades.len().to_string()))?;
    let mut encoded = (32_u32, count).abi_encode();
    for trade in trades {
        let action = TradeAction {
            strategyId: U256::from_str(&trade.strategy_id)
                .map_err(|_| RouteError::InvalidStrategyId(trade.strategy_id.clone()))?,
            amount: u128::try_from(trade.amount)
                .map_err(|_| RouteError::AmountOverflow(trade.amount.to_string()))?,
        };
        encoded.extend(action.abi_encode());
    }
    Ok(format!("0x{}", hex::encode(encoded)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::arb::test_helpers::*;

    fn usdc() -> Token {
        token("USDC", 6)
    }

    fn weth() -> Token {
        token("WETH", 18)
    }

    fn sum_inputs(hops: &[Hop]) -> BigDecimal {
        hops.iter().map(|h| h.input.amount()).sum()
    }

    #[test]
    fn test_needs_two_instructions() {
        let ctx = context();
        let err = TxRouteHandler::new(Vec::new(), &ctx, bnt()).unwrap_err();
        assert_eq!(err, RouteError::NoInstructions);
        assert_eq!(err.to_string(), "No trade instructions found.");

        let one = vec![instruction(&arb_curve_a(), &usdc(), "1000", &weth(), "0.3")];
        assert_eq!(
            TxRouteHandler::new(one, &ctx, bnt()).unwrap_err(),
            RouteError::TooFewInstructions(1)
        );
    }

    #[test]
    fn test_constant_product_cycle() {
        let ctx = context();
        let instructions = vec![
            instruction(&arb_curve_a(), &usdc(), "100000", &weth(), "32"),
            instruction(&arb_curve_b(), &weth(), "32", &usdc(), "108000"),
        ];
        let handler = TxRouteHandler::new(instructions, &ctx, bnt()).unwrap();
        assert!(!handler.contains_carbon);
        let result = handler.run().unwrap();

        // 1000 WETH / 3M USDC at 0.3% fee, less the 0.01% haircut
        let bought = BigDecimal::from(1000)
            - BigDecimal::from(3_000_000_000_i64)
                / (BigDecimal::from(3_000_000) + BigDecimal::from_str("99700").unwrap());
        let bought = quantize(&(bought * safety_haircut()), 18);
        assert_eq!(result.instructions[0].output().amount(), &bought);
        assert_eq!(result.instructions[1].input().amount(), &bought);

        let sold = result.instructions[1].output().amount().clone();
        assert_eq!(result.profit, sold - BigDecimal::from(100_000));
        assert!(result.profit > BigDecimal::from(3000));

        assert_eq!(
            result.flashloans,
            vec![Flashloan {
                token: TokenId::from("USDC"),
                amount: U256::from(100_000_000_000_u64),
            }]
        );
        let tokens: Vec<(&str, &str)> = result
            .route
            .iter()
            .map(|r| (r.source_token.as_str(), r.target_token.as_str()))
            .collect();
        assert_eq!(tokens, [("USDC", "WETH"), ("WETH", "USDC")]);
        assert_eq!(result.route[0].source_amount, U256::from(100_000_000_000_u64));
        assert_eq!(result.route[1].source_amount, U256::ZERO);
        assert_eq!(
            result.route[1].min_target_amount,
            result.instructions[1].output().wei_amount()
        );
        assert_eq!(result.route[0].extras, Extras::None);
    }

    #[test]
    fn test_carbon_trades_are_aggregated() {
        let c1 = carbon_usdc_weth("7", 2_000_000_000_000_000_000);
        let c2 = carbon_usdc_weth("8", 2_000_000_000_000_000_000);
        let instructions = vec![
            instruction(&c1, &usdc(), "1000", &weth(), "0.3"),
            instruction(&c2, &usdc(), "500", &weth(), "0.15"),
            instruction(&arb_curve_b(), &weth(), "0.45", &usdc(), "1500"),
            instruction(&c1, &usdc(), "10", &weth(), "0.003"),
        ];
        let aggregated = TxRouteHandler::aggregate_carbon_trades(instructions);
        assert_eq!(aggregated.len(), 3);
        assert_eq!(aggregated[0].aggregated_from().len(), 2);
        assert_eq!(aggregated[0].input().amount(), &BigDecimal::from(1500));
        assert_eq!(aggregated[0].curve().cid, "7");
        assert!(aggregated[1].aggregated_from().is_empty());
        // a lone Carbon hop bundles itself
        assert_eq!(aggregated[2].aggregated_from().len(), 1);
    }

    #[test]
    fn test_split_sums_to_aggregate() {
        let ctx = context();
        let c1 = carbon_usdc_weth("7", 2_000_000_000_000_000_000);
        let c2 = carbon_usdc_weth("8", 2_000_000_000_000_000_000);
        let instructions = vec![
            instruction(&c1, &usdc(), "1000", &weth(), "0.3"),
            instruction(&c2, &usdc(), "500", &weth(), "0.15"),
            instruction(&arb_curve_b(), &weth(), "0.45", &usdc(), "1500"),
        ];
        let handler = TxRouteHandler::new(instructions, &ctx, bnt()).unwrap();
        assert!(handler.contains_carbon);
        let result = handler.run().unwrap();

        let carbon = &result.instructions[0];
        let hops = carbon.aggregated_from();
        assert_eq!(hops.len(), 2);
        assert_eq!(sum_inputs(hops), BigDecimal::from(1500));
        assert_eq!(carbon.input().amount(), &BigDecimal::from(1500));
        let outputs: BigDecimal = hops.iter().map(|h| h.output.amount()).sum();
        assert_eq!(carbon.output().amount(), &outputs);
        assert_eq!(result.instructions[1].input().amount(), &outputs);

        let Extras::Carbon(trades) = &result.route[0].extras else {
            panic!("expected Carbon extras");
        };
        let ids: Vec<&str> = trades.iter().map(|t| t.strategy_id.as_str()).collect();
        assert_eq!(ids, ["7", "8"]);
        let wei: U256 = trades.iter().map(|t| t.amount).sum();
        assert_eq!(wei, U256::from(1_500_000_000_u64));
    }

    #[test]
    fn test_leftover_moves_to_earlier_hop() {
        let ctx = context();
        let c1 = carbon_usdc_weth("7", 2_000_000_000_000_000_000);
        // about 350 USDC of capacity
        let c2 = carbon_usdc_weth("8", 100_000_000_000_000_000);
        let instructions = vec![
            instruction(&c1, &usdc(), "1000", &weth(), "0.3"),
            instruction(&c2, &usdc(), "500", &weth(), "0.1"),
            instruction(&arb_curve_b(), &weth(), "0.4", &usdc(), "1400"),
        ];
        let handler = TxRouteHandler::new(instructions, &ctx, bnt()).unwrap();
        let aggregated = TxRouteHandler::aggregate_carbon_trades(handler.instructions.clone());
        let calculated = handler.calculate_trade_outputs(&aggregated).unwrap();
        let hops = calculated[0].aggregated_from();
        assert_eq!(hops.len(), 2);
        assert!(hops[1].input.amount() < &BigDecimal::from(500));
        assert!(hops[0].input.amount() > &BigDecimal::from(1000));
        assert_eq!(sum_inputs(hops), BigDecimal::from(1500));
    }

    #[test]
    fn test_leftover_of_empty_last_hop_is_redistributed() {
        let ctx = context();
        let c1 = carbon_usdc_weth("7", 2_000_000_000_000_000_000);
        // sits on the lower edge of its range, so USDC in fills nothing
        let edge = Arc::new(cl_curve(
            "E",
            ("USDC", 6),
            ("WETH", 18),
            1_000_000_000_000_000_000,
            196_200,
            10,
            "0.0005",
        ));
        let instructions = vec![
            instruction(&c1, &usdc(), "1000", &weth(), "0.3"),
            instruction(&arb_curve_b(), &weth(), "0.3", &usdc(), "1000"),
        ];
        let handler = TxRouteHandler::new(instructions, &ctx, bnt()).unwrap();
        let aggregated = AggregatedHop::new(vec![
            Hop {
                curve: Arc::clone(&c1),
                input: TradeMovement::new(usdc(), &BigDecimal::from(1000)),
                output: TradeMovement::new(weth(), &decimal("0.3")),
            },
            Hop {
                curve: edge,
                input: TradeMovement::new(usdc(), &BigDecimal::from(500)),
                output: TradeMovement::new(weth(), &decimal("0.15")),
            },
        ])
        .unwrap();

        let hops = handler
            .split_aggregate(&aggregated, &usdc(), &weth(), &BigDecimal::from(1500))
            .unwrap();
        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0].curve.cid, "7");
        assert_eq!(hops[0].input.amount(), &BigDecimal::from(1500));
    }

    #[test]
    fn test_curve_errors_propagate() {
        let ctx = context();
        let empty = Arc::new(cp_curve("E", ("WETH", 18), ("USDC", 6), 1000, 0, "0.003"));
        let instructions = vec![
            instruction(&arb_curve_a(), &usdc(), "1000", &weth(), "0.3"),
            instruction(&empty, &weth(), "0.3", &usdc(), "1000"),
        ];
        let handler = TxRouteHandler::new(instructions, &ctx, bnt()).unwrap();
        assert_eq!(
            handler.run().unwrap_err(),
            CurveError::NoLiquidity {
                cid: "E".to_string()
            }
        );
    }

    #[test]
    fn test_bancor_v3_hub_trades_merge() {
        let ctx = context();
        let hub = token("BNT", 18);
        let into_hub =
            Arc::new(bancor_v3_curve("b1", ("USDC", 6), ("BNT", 18), 1_000_000, 2_000_000));
        let out_of_hub =
            Arc::new(bancor_v3_curve("b2", ("BNT", 18), ("WETH", 18), 6_000_000, 1000));
        let instructions = vec![
            instruction(&into_hub, &usdc(), "1000", &hub, "2000"),
            instruction(&out_of_hub, &hub, "2000", &weth(), "0.33"),
            instruction(&arb_curve_b(), &weth(), "0.33", &usdc(), "1150"),
        ];
        let handler = TxRouteHandler::new(instructions, &ctx, bnt()).unwrap();
        let calculated = handler.calculate_trade_outputs(&handler.instructions).unwrap();
        let weth_out = calculated[1].output().clone();
        let merged = handler.aggregate_bancor_v3_trades(calculated);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].curve().cid, "b1");
        assert_eq!(merged[0].input().token, usdc());
        assert_eq!(merged[0].output(), &weth_out);

        // another hub leaves the trades apart
        let other =
            TxRouteHandler::new(handler.instructions.clone(), &ctx, TokenId::from("DAI")).unwrap();
        let calculated = other.calculate_trade_outputs(&other.instructions).unwrap();
        assert_eq!(other.aggregate_bancor_v3_trades(calculated).len(), 3);
    }

    #[test]
    fn test_flashloan_uses_native_token() {
        let ctx = context();
        let eth_usdc = Arc::new(cp_curve("N", ("ETH", 18), ("USDC", 6), 1000, 3_000_000, "0.003"));
        let instructions = vec![
            instruction(&eth_usdc, &weth(), "1", &usdc(), "2900"),
            instruction(&arb_curve_b(), &usdc(), "2900", &weth(), "0.8"),
        ];
        let handler = TxRouteHandler::new(instructions.clone(), &ctx, bnt()).unwrap();
        let loans = handler.flashloans(&instructions);
        assert_eq!(loans[0].token, TokenId::from("ETH"));
        assert_eq!(loans[0].amount, U256::from(1_000_000_000_000_000_000_u128));

        // a WETH curve keeps the wrapped token
        let instructions = vec![
            instruction(&arb_curve_b(), &weth(), "1", &usdc(), "3400"),
            instruction(&arb_curve_a(), &usdc(), "3400", &weth(), "1.1"),
        ];
        assert_eq!(handler.flashloans(&instructions)[0].token, TokenId::from("WETH"));
    }

    #[test]
    fn test_profit_conservation() {
        let instructions = vec![
            instruction(&arb_curve_a(), &usdc(), "1000", &weth(), "0.33"),
            instruction(&arb_curve_b(), &weth(), "0.33", &usdc(), "1150"),
            instruction(&arb_curve_a(), &usdc(), "50", &weth(), "0.016"),
            instruction(&arb_curve_b(), &weth(), "0.016", &usdc(), "56"),
        ];
        let expected = BigDecimal::from(1150 + 56 - 1000 - 50);
        assert_eq!(TxRouteHandler::calculate_trade_profit(&instructions), expected);
        let mut shuffled = instructions.clone();
        shuffled.swap(0, 2);
        shuffled.swap(1, 3);
        assert_eq!(TxRouteHandler::calculate_trade_profit(&shuffled), expected);
    }

    #[test]
    fn test_maximize_last_trade_per_tkn() {
        let step = |source: &str, amount: u64| RouteStruct {
            cid: "1".to_string(),
            exchange_type: ExchangeType::UniswapV2,
            exchange_name: "uniswap_v2".to_string(),
            source_token: TokenId::from(source),
            target_token: TokenId::from("X"),
            source_amount: U256::from(amount),
            min_target_amount: U256::ZERO,
            deadline: None,
            extras: Extras::None,
        };
        let mut route = vec![
            step("USDC", 1),
            step("WETH", 2),
            step("DAI", 3),
            step("WETH", 4),
            step("USDC", 5),
        ];
        maximize_last_trade_per_tkn(&mut route);
        let amounts: Vec<U256> = route.iter().map(|r| r.source_amount).collect();
        assert_eq!(amounts, [1_u64, 2, 0, 0, 5].map(U256::from).to_vec());
        maximize_last_trade_per_tkn(&mut []);
    }

    #[test]
    fn test_custom_data() {
        assert_eq!(custom_data(&Extras::None).unwrap(), "0x");
        assert_eq!(custom_data(&Extras::FeePpm(500)).unwrap(), "0x");

        let extras = Extras::Carbon(vec![
            CarbonTrade {
                strategy_id: "5".to_string(),
                amount: U256::from(1000),
            },
            CarbonTrade {
                strategy_id: "6".to_string(),
                amount: U256::from(255),
            },
        ]);
        let encoded = custom_data(&extras).unwrap();
        let words = ["20", "2", "5", "3e8", "6", "ff"]
            .map(|w| format!("{w:0>64}"))
            .concat();
        assert_eq!(encoded, format!("0x{words}"));

        let bad_id = Extras::Carbon(vec![CarbonTrade {
            strategy_id: "strategy".to_string(),
            amount: U256::from(1),
        }]);
        assert_eq!(
            custom_data(&bad_id),
            Err(RouteError::InvalidStrategyId("strategy".to_string()))
        );
        let too_large = Extras::Carbon(vec![CarbonTrade {
            strategy_id: "1".to_string(),
            amount: U256::MAX,
        }]);
        assert!(matches!(custom_data(&too_large), Err(RouteError::AmountOverflow(_))));
    }

    #[test]
    fn test_route_struct_serialization() {
        let route = RouteStruct {
            cid: "3".to_string(),
            exchange_type: ExchangeType::UniswapV3,
            exchange_name: "uniswap_v3".to_string(),
            source_token: TokenId::from("USDC"),
            target_token: TokenId::from("WETH"),
            source_amount: U256::from(1_000_000),
            min_target_amount: U256::from(300_000_000_000_000_u64),
            deadline: None,
            extras: Extras::FeePpm(500),
        };
        let json = serde_json::to_value(&route).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "cid": "3",
                "exchange_type": 3,
                "exchange_name": "uniswap_v3",
                "source_token": "USDC",
                "target_token": "WETH",
                "source_amount": "1000000",
                "min_target_amount": "300000000000000",
                "extras": 500,
            })
        );
        assert_eq!(serde_json::to_value(Extras::None).unwrap(), serde_json::Value::Null);
        assert_eq!(fee_ppm(&BigDecimal::from_str("0.0005").unwrap()), Some(500));
    }
}
