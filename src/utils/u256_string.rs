//! Serde adapter for `U256` values carried as decimal strings.
//!
//! Deserialization also accepts plain JSON integers and `0x`-prefixed hex strings.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::U256;
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};

/// Serializes a `U256` as a base-10 string.
///
/// # Errors
///
/// Propagates serializer errors
pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

/// Deserializes a `U256` from a decimal string, hex string or integer.
///
/// # Errors
///
/// Fails on negative numbers, non-numeric strings and values wider than 256 bits
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    deserializer.deserialize_any(U256Visitor)
}

/// Visitor accepting the textual and integer forms of a `U256`
struct U256Visitor;

impl Visitor<'_> for U256Visitor {
    type Value = U256;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer or decimal string")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<U256, E> {
        Ok(U256::from(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<U256, E> {
        u64::try_from(value)
            .map(U256::from)
            .map_err(|_| E::custom(format!("negative amount {value}")))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<U256, E> {
        let parsed = match value.strip_prefix("0x") {
            Some(hex) => U256::from_str_radix(hex, 16),
            None => U256::from_str(value),
        };
        parsed.map_err(|e| E::custom(format!("invalid uint256 {value:?}: {e}")))
    }
}
