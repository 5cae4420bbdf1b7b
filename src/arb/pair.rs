//! Token pairs and the "primary" pair convention.
//!
//! A pair string `base/quote` can be written in two directions. The primary direction
//! puts the more numeraire-like token in the quote position, so `WETH/USDC` and
//! `USDC/WETH` both normalize to `WETH/USDC`.

use std::fmt::{self, Debug, Display};

use super::token::{Token, TokenId};

/// Numeraire ranking, most numeraire-like first. Symbols not listed rank last.
const NUMERAIRE_TOKENS: &[&str] = &[
    "USDC", "USDT", "DAI", "TUSD", "BUSD", "PAX", "GUSD", "USDP", "SUSD", "LUSD", "EURS", "EURT",
    "EUROC", "ETH", "WETH", "WBTC", "BTC", "BNT",
];

/// Returns the numeraire rank of a symbol; lower ranks are preferred as quote tokens.
fn numeraire_rank(symbol: &str) -> usize {
    let symbol = symbol.to_uppercase();
    NUMERAIRE_TOKENS
        .iter()
        .position(|tkn| *tkn == symbol)
        .unwrap_or(usize::MAX)
}

/// An ordered pair of tokens, read as "price of `base` in units of `quote`".
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pair {
    /// The token being priced
    pub base: TokenId,
    /// The token the price is quoted in
    pub quote: TokenId,
}

impl Pair {
    /// Creates a pair in the given direction.
    #[must_use]
    pub const fn new(base: TokenId, quote: TokenId) -> Self {
        Self { base, quote }
    }

    /// Creates the primary pair for two tokens.
    ///
    /// The token with the better numeraire rank becomes the quote. When both rank the
    /// same (typically both unranked) the addresses decide, so the result never depends
    /// on argument order.
    #[must_use]
    pub fn primary(a: &Token, b: &Token) -> Self {
        let (rank_a, rank_b) = (numeraire_rank(&a.symbol), numeraire_rank(&b.symbol));
        let a_is_quote = rank_a < rank_b || (rank_a == rank_b && a.address > b.address);
        if a_is_quote {
            Self::new(b.address.clone(), a.address.clone())
        } else {
            Self::new(a.address.clone(), b.address.clone())
        }
    }

    /// Returns the same pair in the opposite direction.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self::new(self.quote.clone(), self.base.clone())
    }

    /// Whether the token is either side of the pair.
    #[must_use]
    pub fn contains(&self, tkn: &TokenId) -> bool {
        &self.base == tkn || &self.quote == tkn
    }

    /// Returns the token on the other side of `tkn`, if `tkn` is part of the pair.
    #[must_use]
    pub fn other(&self, tkn: &TokenId) -> Option<&TokenId> {
        if &self.base == tkn {
            Some(&self.quote)
        } else if &self.quote == tkn {
            Some(&self.base)
        } else {
            None
        }
    }

    /// Whether both pairs hold the same two tokens, in any direction.
    #[must_use]
    pub fn same_tokens(&self, other: &Self) -> bool {
        self == other || self == &other.reversed()
    }
}

impl Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl Debug for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_is_direction_independent() {
        for (symbol_a, symbol_b, expected) in &[
            // a,      b,      primary
            ("WETH", "USDC", "WETH/USDC"),
            ("USDC", "WETH", "WETH/USDC"),
            ("WBTC", "WETH", "WBTC/WETH"),
            ("LINK", "USDT", "LINK/USDT"),
            ("DAI", "USDC", "DAI/USDC"),
        ] {
            let a = Token::new(*symbol_a, 18, symbol_a);
            let b = Token::new(*symbol_b, 18, symbol_b);
            assert_eq!(Pair::primary(&a, &b).to_string(), *expected);
            assert_eq!(Pair::primary(&b, &a).to_string(), *expected);
        }
    }

    #[test]
    fn test_unranked_tokens_order_by_address() {
        let a = Token::new("0x01", 18, "FOO");
        let b = Token::new("0x02", 18, "BAR");
        assert_eq!(Pair::primary(&a, &b), Pair::primary(&b, &a));
        assert_eq!(Pair::primary(&a, &b).base, TokenId::from("0x01"));
    }

    #[test]
    fn test_other() {
        let pair = Pair::new(TokenId::from("A"), TokenId::from("B"));
        assert_eq!(pair.other(&TokenId::from("A")), Some(&TokenId::from("B")));
        assert_eq!(pair.other(&TokenId::from("C")), None);
        assert!(pair.same_tokens(&pair.reversed()));
    }
}
