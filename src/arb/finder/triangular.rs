use super::{scan, ArbitrageFinder, FinderConfig, Opportunity};
use crate::arb::container::CurveContainer;

/// Trades around three-token circuits, e.g. `USDC -> WETH -> DAI -> USDC`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriangularFinder;

impl ArbitrageFinder for TriangularFinder {
    fn name(&self) -> &'static str {
        "triangular"
    }

    fn find(&self, curves: &CurveContainer, config: &FinderConfig) -> Vec<Opportunity> {
        scan(curves, config, &[3])
    }
}
