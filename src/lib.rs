/*!
 * # flashroute - Flashloan Arbitrage Route Finder
 *
 * flashroute searches a snapshot of decentralized exchange curves for closed trade
 * circuits that return more of a flashloaned token than they borrow, sizes the trade
 * and emits a wei-precise route for an arbitrage contract.
 *
 * ## Core Features
 *
 * - **Curve Math**: Constant-product, concentrated-liquidity and Carbon curves
 * - **Search**: Pairwise, triangular and graph finders over the token graph
 * - **Sizing**: Bisection optimizers over the composed transport function
 * - **Routing**: Carbon aggregation, exact simulation and route struct encoding
 *
 * ## Module Structure
 *
 * - `arb`: Curves, finders, optimizers and the route handler
 * - `config`: Configuration loaded from the environment
 * - `errors`: Typed domain errors
 * - `io`: Input and output documents
 * - `pipeline`: End to end runner
 * - `utils`: Logger, constants and serde helpers
 */

/// Curves, finders, optimizers and the route handler
pub mod arb;
/// Configuration loaded from the environment
pub mod config;
/// Typed domain errors
pub mod errors;
/// Input and output documents
pub mod io;
/// End to end runner
pub mod pipeline;
/// Utility functions and helpers
pub mod utils;
