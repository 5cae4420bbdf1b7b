use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// A token address. The input supplies addresses as strings and they are the unique
/// key of a token, so they are compared verbatim.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TokenId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TokenId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// An ERC20 (or native) token as described by the input snapshot.
///
/// Two tokens are equal when their addresses are equal. Symbol and decimals are
/// descriptive only.
#[derive(Clone, Serialize, Deserialize)]
pub struct Token {
    /// Unique address of the token
    pub address: TokenId,
    /// Number of decimals of the smallest unit (wei)
    pub decimals: u8,
    /// Ticker symbol, used for the numeraire ranking of pairs
    pub symbol: String,
}

impl Token {
    /// Creates a new token.
    ///
    /// # Arguments
    ///
    /// * `address` - Unique address of the token
    /// * `decimals` - Decimals of the token's smallest unit
    /// * `symbol` - Ticker symbol
    #[must_use]
    pub fn new(address: impl Into<TokenId>, decimals: u8, symbol: &str) -> Self {
        Self {
            address: address.into(),
            decimals,
            symbol: symbol.to_string(),
        }
    }

    /// Returns the token's address.
    #[must_use]
    pub const fn id(&self) -> &TokenId {
        &self.address
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.symbol, self.address)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}
