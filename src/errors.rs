//! # Error types
//!
//! Typed errors for the arbitrage pipeline. Curve-state errors are scoped to a single
//! candidate opportunity: the pipeline logs and skips them. Construction and configuration
//! errors abort the run and surface through `eyre` at the application seams.

use thiserror::Error;

use crate::arb::math::MathError;
use crate::arb::token::TokenId;

/// A trade could not be simulated against the current state of a curve.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CurveError {
    /// The side of the curve that would pay out holds no liquidity
    #[error("trade incoming to empty curve {cid}")]
    NoLiquidity {
        /// Curve identifier
        cid: String,
    },
    /// The token is not one of the curve's two tokens
    #[error("token {token} does not belong to curve {cid}")]
    TokenMismatch {
        /// Curve identifier
        cid: String,
        /// The offending token
        token: TokenId,
    },
    /// Integer or decimal arithmetic failed inside the curve math
    #[error("curve {cid}: {source}")]
    Math {
        /// Curve identifier
        cid: String,
        /// Underlying math failure
        source: MathError,
    },
}

/// Mutation or lookup failures of a `CurveContainer`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    /// The container was frozen and can no longer be modified
    #[error("curve container is frozen")]
    Frozen,
    /// Another curve with the same cid is already present
    #[error("duplicate curve id {0}")]
    DuplicateCid(String),
    /// A curve references a token missing from the token list
    #[error("curve {cid} references unknown token {token}")]
    UnknownToken {
        /// Curve identifier
        cid: String,
        /// The unknown token
        token: TokenId,
    },
}

/// `TxRouteHandler` construction and route encoding failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// No trade instructions were supplied
    #[error("No trade instructions found.")]
    NoInstructions,
    /// A route needs at least two hops to close a cycle
    #[error("Length of trade instructions must be greater than 1, got {0}.")]
    TooFewInstructions(usize),
    /// A Carbon strategy id is not a valid uint256
    #[error("invalid strategy id {0}")]
    InvalidStrategyId(String),
    /// A Carbon trade amount does not fit into uint128
    #[error("amount {0} does not fit into uint128")]
    AmountOverflow(String),
}

/// Invalid run configuration or input context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A token referenced by the context is not part of the token list
    #[error("context {role} token {token} is not in the token list")]
    MissingContextToken {
        /// Which context field referenced the token
        role: &'static str,
        /// The missing token
        token: TokenId,
    },
    /// A configuration value could not be parsed
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Configuration key
        key: &'static str,
        /// Raw value
        value: String,
    },
}
