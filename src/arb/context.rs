//! Run-scoped chain context: which token is the gas token, its wrapped form, and the
//! profit gate. Built once per run and passed by reference.

use std::collections::HashMap;

use bigdecimal::BigDecimal;

use super::pool::Curve;
use super::token::{Token, TokenId};
use crate::errors::ConfigError;

/// Chain-level tokens and thresholds of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    /// Native gas token (e.g. the `0xEeee...` placeholder for ETH)
    pub gas_token: TokenId,
    /// ERC20 wrapper of the gas token (e.g. WETH)
    pub wrapped_gas_token: TokenId,
    /// Reference stablecoin
    pub stablecoin: TokenId,
    /// Minimum profit, in gas token units, for a route to be emitted
    pub min_native_profit: BigDecimal,
}

impl Context {
    /// Creates a context, checking that every referenced token is known.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingContextToken` if a token is not in `tokens`
    pub fn new(
        gas_token: TokenId,
        wrapped_gas_token: TokenId,
        stablecoin: TokenId,
        min_native_profit: BigDecimal,
        tokens: &HashMap<TokenId, Token>,
    ) -> Result<Self, ConfigError> {
        for (role, token) in [
            ("gas", &gas_token),
            ("wrapped gas", &wrapped_gas_token),
            ("stablecoin", &stablecoin),
        ] {
            if !tokens.contains_key(token) {
                return Err(ConfigError::MissingContextToken {
                    role,
                    token: token.clone(),
                });
            }
        }
        Ok(Self {
            gas_token,
            wrapped_gas_token,
            stablecoin,
            min_native_profit,
        })
    }

    /// Whether two tokens are the same economic asset: equal, or the gas token and its
    /// wrapped form.
    #[must_use]
    pub fn is_gas_alias(&self, a: &TokenId, b: &TokenId) -> bool {
        a == b
            || (a == &self.gas_token && b == &self.wrapped_gas_token)
            || (a == &self.wrapped_gas_token && b == &self.gas_token)
    }

    /// Maps the wrapped gas token to the native gas token, other tokens to themselves.
    #[must_use]
    pub fn wrapped_to_native(&self, tkn: &TokenId) -> TokenId {
        if tkn == &self.wrapped_gas_token {
            self.gas_token.clone()
        } else {
            tkn.clone()
        }
    }

    /// Returns the curve's own token standing for `tkn`, honouring the gas alias.
    #[must_use]
    pub fn curve_token<'a>(&self, curve: &'a Curve, tkn: &TokenId) -> Option<&'a Token> {
        curve.token(tkn).or_else(|| {
            [&curve.tkn0, &curve.tkn1]
                .into_iter()
                .find(|candidate| self.is_gas_alias(&candidate.address, tkn))
        })
    }
}
