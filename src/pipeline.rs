//! # Pipeline runner
//!
//! Glues the pieces together for one market snapshot: build the curves, search for
//! opportunities, turn the best feasible one into a route and gate it on profit.

use std::collections::HashMap;

use bigdecimal::{BigDecimal, FromPrimitive, Zero};
use eyre::Result;
use log::{debug, info, warn};

use crate::arb::container::CurveContainer;
use crate::arb::context::Context;
use crate::arb::finder::Opportunity;
use crate::arb::graph::PairGraph;
use crate::arb::math::quantize;
use crate::arb::pair::Pair;
use crate::arb::route::{RouteResult, TxRouteHandler};
use crate::arb::token::{Token, TokenId};
use crate::arb::trade::TradeInstruction;
use crate::config::Config;
use crate::io::{Input, Output, PoolRecord};

/// Decimals used for gas token amounts when the gas token is missing from the list
const GAS_DECIMALS: u8 = 18;

/// Runs the arbitrage search on one snapshot.
///
/// # Arguments
/// * `input` - Market snapshot
/// * `config` - Run configuration; the input's `mode` overrides `config.mode`
///
/// # Returns
/// * `Result<Output>` - The route, or an empty route with the best profit found
///
/// A route whose profit cannot be priced in the gas token is dropped with a warning
/// and yields an empty route.
///
/// # Errors
/// * If the context or a curve of the input is invalid
pub fn run(input: Input, config: &Config) -> Result<Output> {
    if !input.event_info.is_null() {
        debug!("event: {}", input.event_info);
    }
    let tokens = token_map(input.tokens);
    let context = input.context.to_context(&tokens)?;
    let curves = build_container(input.curves, &tokens)?;

    let finder = input.mode.unwrap_or(config.mode).finder();
    let finder_config = config.finder_config(input.funding.tokens.into_keys().collect());
    info!(
        "running {} finder over {} curves and {} tokens",
        finder.name(),
        curves.len(),
        tokens.len()
    );

    let opportunities = finder.find(&curves, &finder_config);
    let Some(result) = best_route(&opportunities, &context, config)? else {
        info!("no feasible opportunity");
        return Ok(Output::empty(BigDecimal::zero()));
    };

    let Some(profit) = gas_profit(&result, &curves, &context, &tokens) else {
        if let Some(first) = result.instructions.first() {
            warn!(
                "no price for {} in gas token, dropping route",
                first.input().token.address
            );
        }
        return Ok(Output::empty(BigDecimal::zero()));
    };
    if profit < context.min_native_profit {
        info!(
            "profit {profit} below the minimum of {}",
            context.min_native_profit
        );
        return Ok(Output::empty(profit));
    }
    info!("route over {} steps, profit {profit}", result.route.len());
    Ok(Output {
        profit_gas_token: profit,
        flashloans: result.flashloans,
        route: result.route,
    })
}

/// Lists the circuits of `length` tokens through every flashloan token of the input.
///
/// # Errors
/// * If a curve of the input is invalid
pub fn circuits(input: Input, length: usize) -> Result<Vec<Vec<TokenId>>> {
    let tokens = token_map(input.tokens);
    let curves = build_container(input.curves, &tokens)?;
    let graph = PairGraph::from_container(&curves);
    Ok(input
        .funding
        .tokens
        .keys()
        .flat_map(|tkn| graph.circuits(tkn, length))
        .collect())
}

/// Indexes tokens by address
fn token_map(tokens: Vec<Token>) -> HashMap<TokenId, Token> {
    tokens
        .into_iter()
        .map(|token| (token.address.clone(), token))
        .collect()
}

/// Builds the frozen curve container of a run
fn build_container(
    records: Vec<PoolRecord>,
    tokens: &HashMap<TokenId, Token>,
) -> Result<CurveContainer> {
    let mut curves = CurveContainer::new();
    for record in records {
        curves.add(record.into_curve(tokens)?)?;
    }
    curves.freeze();
    Ok(curves)
}

/// Routes the opportunities best first and returns the first one that survives the
/// exact simulation
fn best_route(
    opportunities: &[Opportunity],
    context: &Context,
    config: &Config,
) -> Result<Option<RouteResult>> {
    for opportunity in opportunities {
        let instructions = match TradeInstruction::from_opportunity(opportunity, context) {
            Ok(instructions) => instructions,
            Err(e) => {
                warn!("skipping opportunity: {e}");
                continue;
            }
        };
        let handler = TxRouteHandler::new(instructions, context, config.bancor_v3_hub.clone())?;
        match handler.run() {
            Ok(result) => return Ok(Some(result)),
            Err(e) => warn!("skipping opportunity: {e}"),
        }
    }
    Ok(None)
}

/// Profit of a route in gas token units, `None` if the flashloan token has no price
/// against the gas token or its wrapper
fn gas_profit(
    result: &RouteResult,
    curves: &CurveContainer,
    context: &Context,
    tokens: &HashMap<TokenId, Token>,
) -> Option<BigDecimal> {
    let Some(first) = result.instructions.first() else {
        return Some(BigDecimal::zero());
    };
    let tkn = &first.input().token.address;
    if context.is_gas_alias(tkn, &context.gas_token)
        || context.is_gas_alias(tkn, &context.wrapped_gas_token)
    {
        return Some(result.profit.clone());
    }
    let price = [&context.wrapped_gas_token, &context.gas_token]
        .into_iter()
        .find_map(|gas| curves.price_for_pair(&Pair::new(tkn.clone(), gas.clone())))
        .and_then(BigDecimal::from_f64)?;
    let decimals = tokens
        .get(&context.gas_token)
        .map_or(GAS_DECIMALS, |token| token.decimals);
    Some(quantize(&(&result.profit * price), decimals))
}
