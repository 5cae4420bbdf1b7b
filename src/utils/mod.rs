/// Constants
pub mod constants;
/// Logger
pub mod logger;
/// Serde adapter for `U256` decimal strings
pub mod u256_string;
