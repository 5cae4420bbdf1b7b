use super::{scan, ArbitrageFinder, FinderConfig, Opportunity};
use crate::arb::container::CurveContainer;

/// Trades a flashloan token against another token across two parallel curves.
#[derive(Debug, Clone, Copy, Default)]
pub struct PairwiseFinder;

impl ArbitrageFinder for PairwiseFinder {
    fn name(&self) -> &'static str {
        "pairwise"
    }

    fn find(&self, curves: &CurveContainer, config: &FinderConfig) -> Vec<Opportunity> {
        scan(curves, config, &[2])
    }
}
