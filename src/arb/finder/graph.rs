use eyre::{bail, Result};
use log::info;

use super::{scan, ArbitrageFinder, FinderConfig, Opportunity};
use crate::arb::container::CurveContainer;

/// Searches circuits of every configured length.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphFinder;

impl ArbitrageFinder for GraphFinder {
    fn name(&self) -> &'static str {
        "graph"
    }

    fn find(&self, curves: &CurveContainer, config: &FinderConfig) -> Vec<Opportunity> {
        scan(curves, config, &config.hops)
    }
}

/// Runs the graph search and fails when nothing is profitable.
///
/// # Errors
///
/// Returns an error if no circuit closes with a profit
pub fn multi_optimize(curves: &CurveContainer, config: &FinderConfig) -> Result<Vec<Opportunity>> {
    let found = GraphFinder.find(curves, config);
    if found.is_empty() {
        bail!("no profitable circuits found");
    }
    info!(
        "best circuit: profit {} {} over {} hops",
        found[0].profit,
        found[0].tkn,
        found[0].hops.len()
    );
    Ok(found)
}
