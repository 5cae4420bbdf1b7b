use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::U256;
use bigdecimal::BigDecimal;

use super::container::CurveContainer;
use super::context::Context;
use super::math::carbon::{encode_float, encode_rate, CarbonOrder};
use super::math::concentrated::sqrt_ratio_at_tick;
use super::math::{pow10, to_wei};
use super::pool::{Curve, CurveParams, ExchangeType};
use super::token::{Token, TokenId};
use super::trade::{Hop, TradeInstruction, TradeMovement};

/// `(symbol, decimals)`; the symbol doubles as the address
pub type TokenArgs<'a> = (&'a str, u8);

/// `(cid, tkn0, tkn1, reserve0, reserve1, fee)` with reserves in whole tokens
pub type PoolArgs<'a> = (&'a str, TokenArgs<'a>, TokenArgs<'a>, u64, u64, &'a str);

#[allow(dead_code)]
pub fn token(symbol: &str, decimals: u8) -> Token {
    Token::new(TokenId::from(symbol), decimals, symbol)
}

#[allow(dead_code)]
pub fn decimal(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

#[allow(dead_code)]
pub fn cp_curve(
    cid: &str,
    tkn0: TokenArgs,
    tkn1: TokenArgs,
    reserve0: u64,
    reserve1: u64,
    fee: &str,
) -> Curve {
    Curve::new(
        cid,
        ExchangeType::UniswapV2,
        "uniswap_v2",
        token(tkn0.0, tkn0.1),
        token(tkn1.0, tkn1.1),
        decimal(fee),
        CurveParams::ConstantProduct {
            reserve0: to_wei(&BigDecimal::from(reserve0), tkn0.1),
            reserve1: to_wei(&BigDecimal::from(reserve1), tkn1.1),
        },
    )
    .unwrap()
}

/// A fee-less Bancor V3 pool
#[allow(dead_code)]
pub fn bancor_v3_curve(
    cid: &str,
    tkn0: TokenArgs,
    tkn1: TokenArgs,
    reserve0: u64,
    reserve1: u64,
) -> Curve {
    Curve::new(
        cid,
        ExchangeType::BancorV3,
        "bancor_v3",
        token(tkn0.0, tkn0.1),
        token(tkn1.0, tkn1.1),
        BigDecimal::from(0),
        CurveParams::ConstantProduct {
            reserve0: to_wei(&BigDecimal::from(reserve0), tkn0.1),
            reserve1: to_wei(&BigDecimal::from(reserve1), tkn1.1),
        },
    )
    .unwrap()
}

/// A Uniswap V3 curve sitting exactly on `tick`
#[allow(dead_code)]
pub fn cl_curve(
    cid: &str,
    tkn0: TokenArgs,
    tkn1: TokenArgs,
    liquidity: u128,
    tick: i32,
    tick_spacing: i32,
    fee: &str,
) -> Curve {
    Curve::new(
        cid,
        ExchangeType::UniswapV3,
        "uniswap_v3",
        token(tkn0.0, tkn0.1),
        token(tkn1.0, tkn1.1),
        decimal(fee),
        CurveParams::ConcentratedLiquidity {
            liquidity,
            sqrt_price_q96: sqrt_ratio_at_tick(tick).unwrap(),
            tick,
            tick_spacing,
        },
    )
    .unwrap()
}

/// A full Carbon order of `y` wei quoted in target tokens per source token
#[allow(dead_code)]
pub fn carbon_order(
    y: u128,
    price_low: &str,
    price_high: &str,
    decimals_in: u8,
    decimals_out: u8,
) -> CarbonOrder {
    let scale = pow10(decimals_out) / pow10(decimals_in);
    let low = encode_rate(&(decimal(price_low) * &scale)).unwrap();
    let high = encode_rate(&(decimal(price_high) * &scale)).unwrap();
    CarbonOrder {
        y: U256::from(y),
        z: U256::from(y),
        a: encode_float(high - low),
        b: encode_float(low),
    }
}

/// A Carbon strategy; `order0` pays `tkn0` and `order1` pays `tkn1`
#[allow(dead_code)]
pub fn carbon_curve(
    cid: &str,
    tkn0: TokenArgs,
    tkn1: TokenArgs,
    order0: CarbonOrder,
    order1: CarbonOrder,
) -> Curve {
    Curve::new(
        cid,
        ExchangeType::CarbonV1,
        "carbon_v1",
        token(tkn0.0, tkn0.1),
        token(tkn1.0, tkn1.1),
        decimal("0.002"),
        CurveParams::Carbon { order0, order1 },
    )
    .unwrap()
}

/// A USDC/WETH strategy selling `weth_wei` WETH at 3333-4000 USDC
#[allow(dead_code)]
pub fn carbon_usdc_weth(cid: &str, weth_wei: u128) -> Arc<Curve> {
    Arc::new(carbon_curve(
        cid,
        ("USDC", 6),
        ("WETH", 18),
        carbon_order(5_000_000_000, "3000", "3500", 18, 6),
        carbon_order(weth_wei, "0.00025", "0.0003", 6, 18),
    ))
}

#[allow(dead_code)]
pub fn container(pools: &[PoolArgs]) -> CurveContainer {
    container_with(pools, Vec::new())
}

/// Constant-product pools from tuples, followed by prebuilt curves
#[allow(dead_code)]
pub fn container_with(pools: &[PoolArgs], curves: Vec<Curve>) -> CurveContainer {
    let mut all: Vec<Curve> = pools
        .iter()
        .map(|(cid, tkn0, tkn1, reserve0, reserve1, fee)| {
            cp_curve(cid, *tkn0, *tkn1, *reserve0, *reserve1, fee)
        })
        .collect();
    all.extend(curves);
    CurveContainer::from_curves(all).unwrap()
}

/// WETH at 3000 USDC
#[allow(dead_code)]
pub fn arb_curve_a() -> Arc<Curve> {
    Arc::new(cp_curve("A", ("WETH", 18), ("USDC", 6), 1000, 3_000_000, "0.003"))
}

/// WETH at 3500 USDC
#[allow(dead_code)]
pub fn arb_curve_b() -> Arc<Curve> {
    Arc::new(cp_curve("B", ("WETH", 18), ("USDC", 6), 1000, 3_500_000, "0.003"))
}

/// ETH native, WETH wrapped, USDC stable
#[allow(dead_code)]
pub fn context() -> Context {
    Context {
        gas_token: TokenId::from("ETH"),
        wrapped_gas_token: TokenId::from("WETH"),
        stablecoin: TokenId::from("USDC"),
        min_native_profit: decimal("0.01"),
    }
}

#[allow(dead_code)]
pub fn bnt() -> TokenId {
    TokenId::from("BNT")
}

/// A hop with the given amounts, unchecked against the curve
#[allow(dead_code)]
pub fn instruction(
    curve: &Arc<Curve>,
    input: &Token,
    amount_in: &str,
    output: &Token,
    amount_out: &str,
) -> TradeInstruction {
    TradeInstruction::Hop(Hop {
        curve: Arc::clone(curve),
        input: TradeMovement::new(input.clone(), &decimal(amount_in)),
        output: TradeMovement::new(output.clone(), &decimal(amount_out)),
    })
}

/// A Carbon USDC -> WETH hop
#[allow(dead_code)]
pub fn usdc_weth_hop(cid: &str, amount_in: &str, amount_out: &str) -> Hop {
    Hop {
        curve: carbon_usdc_weth(cid, 2_000_000_000_000_000_000),
        input: TradeMovement::new(token("USDC", 6), &decimal(amount_in)),
        output: TradeMovement::new(token("WETH", 18), &decimal(amount_out)),
    }
}
