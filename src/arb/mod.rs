//! # Arbitrage Module
//!
//! Curves and their pricing math, the indexed curve container, the pair graph and the
//! finders searching it, the trade-size optimizers, and the route handler turning a
//! sized opportunity into contract instructions.

/// Indexed curve collection
pub mod container;
/// Run-scoped chain context
pub mod context;
/// Directed edges of the token graph
pub mod edge;
/// Arbitrage search strategies
pub mod finder;
/// Token pair graph and circuit enumeration
pub mod graph;
/// Exact and approximate curve math
pub mod math;
/// Token pairs and the primary pair convention
pub mod pair;
/// Curves and venues
pub mod pool;
/// Wei-precise route construction
pub mod route;
/// Test helpers and utilities
#[cfg(test)]
mod test_helpers;
/// Token data structures and utilities
pub mod token;
/// Trade instructions
pub mod trade;
/// Token transport and trade sizing
pub mod transport;
