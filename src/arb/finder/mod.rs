//! # Arbitrage finders
//!
//! Every finder walks circuits of the pair graph through the flashloan tokens, expands
//! them into concrete curve paths and keeps the ones whose sized trade closes with a
//! profit. They differ only in which circuit lengths they look at.

mod graph;
mod pairwise;
mod triangular;

use std::fmt::{self, Debug};
use std::sync::Arc;

use clap::ValueEnum;
use derive_more::Display;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

pub use graph::{multi_optimize, GraphFinder};
pub use pairwise::PairwiseFinder;
pub use triangular::TriangularFinder;

use super::container::CurveContainer;
use super::edge::EdgeContainer;
use super::graph::PairGraph;
use super::pool::Curve;
use super::token::TokenId;
use super::transport::{explode, ExplodedPath, Optimizer};

/// One sized hop of an opportunity, amounts in token units.
#[derive(Clone)]
pub struct OpportunityHop {
    /// Curve traded
    pub curve: Arc<Curve>,
    /// Token sold
    pub tkn_in: TokenId,
    /// Approximate amount sold
    pub amount_in: f64,
    /// Token bought
    pub tkn_out: TokenId,
    /// Approximate amount bought
    pub amount_out: f64,
}

impl OpportunityHop {
    /// Curve id of the hop.
    #[must_use]
    pub fn cid(&self) -> &str {
        &self.curve.cid
    }
}

impl Debug for OpportunityHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {:?} -> {} {:?}",
            self.curve.cid, self.amount_in, self.tkn_in, self.amount_out, self.tkn_out
        )
    }
}

/// A closed trade path with approximate amounts.
#[derive(Debug, Clone)]
pub struct Opportunity {
    /// Hops in trade order
    pub hops: Vec<OpportunityHop>,
    /// Token borrowed and repaid
    pub tkn: TokenId,
    /// Amount borrowed
    pub amount_in: f64,
    /// `amount_out - amount_in`, in `tkn`
    pub profit: f64,
    /// Product of the marginal prices along the path
    pub price_transport: f64,
}

/// Search parameters shared by every finder.
#[derive(Debug, Clone, PartialEq)]
pub struct FinderConfig {
    /// Tokens that can be flashloaned, i.e. where circuits start and end
    pub flashloan_tokens: Vec<TokenId>,
    /// Circuit lengths searched by the graph finder
    pub hops: Vec<usize>,
    /// Minimum `price_transport - 1` for a path to be sized
    pub threshold: f64,
    /// Iteration cap of the optimizers
    pub max_iterations: usize,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            flashloan_tokens: Vec::new(),
            hops: vec![2, 3],
            threshold: 0.0,
            max_iterations: 1000,
        }
    }
}

/// A search strategy over a curve container.
pub trait ArbitrageFinder {
    /// Strategy name, used in logs.
    fn name(&self) -> &'static str;

    /// Finds the profitable opportunities, best first.
    fn find(&self, curves: &CurveContainer, config: &FinderConfig) -> Vec<Opportunity>;
}

/// Selects a finder by name.
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FinderKind {
    /// Two-curve circuits over parallel pools
    #[display("pairwise")]
    Pairwise,
    /// Three-token circuits
    #[display("triangular")]
    Triangular,
    /// Circuits of every configured length
    #[default]
    #[display("graph")]
    Graph,
}

impl FinderKind {
    /// Returns the finder implementing this strategy.
    #[must_use]
    pub fn finder(self) -> Box<dyn ArbitrageFinder> {
        match self {
            Self::Pairwise => Box::new(PairwiseFinder),
            Self::Triangular => Box::new(TriangularFinder),
            Self::Graph => Box::new(GraphFinder),
        }
    }
}

/// Scans the circuits of the given lengths through every flashloan token.
///
/// Each circuit is tried in both orientations. A path is sized only when its price
/// transport beats `1 + threshold`, and kept only when the sized trade is profitable.
pub(crate) fn scan(
    curves: &CurveContainer,
    config: &FinderConfig,
    lengths: &[usize],
) -> Vec<Opportunity> {
    let graph = PairGraph::from_container(curves);
    let edges = EdgeContainer::from_container(curves);
    let optimizer = Optimizer::new(config.max_iterations);

    let mut found = Vec::new();
    for tkn in &config.flashloan_tokens {
        for &length in lengths {
            for circuit in graph.circuits(tkn, length) {
                let mut reversed = circuit.clone();
                reversed.reverse();
                let orientations = if reversed == circuit {
                    vec![circuit]
                } else {
                    vec![circuit, reversed]
                };
                for path in orientations.iter().flat_map(|c| explode(c, &edges)) {
                    if let Some(opportunity) = evaluate(tkn, &path, &optimizer, config.threshold)
                    {
                        found.push(opportunity);
                    }
                }
            }
        }
    }
    found.sort_by(|a, b| b.profit.total_cmp(&a.profit));
    info!(
        "{} profitable opportunities over {} curves",
        found.len(),
        curves.len()
    );
    found
}

/// Sizes one exploded path and returns it if it closes with a profit
fn evaluate(
    tkn: &TokenId,
    path: &ExplodedPath,
    optimizer: &Optimizer,
    threshold: f64,
) -> Option<Opportunity> {
    let price_transport = path.price_transport();
    if price_transport <= 1.0 + threshold {
        return None;
    }
    let sized = optimizer.ttx_opt_amt(path);
    if let Some(message) = &sized.errormsg {
        warn!("{path:?}: {message}");
    }
    let amount_in = sized.result?;
    let detail = match path.transport_detail(amount_in) {
        Ok(detail) => detail,
        Err(exceeded) => {
            warn!("{path:?}: {exceeded}");
            return None;
        }
    };
    let amount_out = detail.last()?.amount_out;
    let profit = amount_out - amount_in;
    debug!("{path:?}: price {price_transport:.6}, in {amount_in}, profit {profit}");
    if profit <= 0.0 {
        return None;
    }

    let hops = path
        .steps
        .iter()
        .zip(detail)
        .map(|(step, amounts)| OpportunityHop {
            curve: Arc::clone(&step.curve),
            tkn_in: amounts.tkn_in,
            amount_in: amounts.amount_in,
            tkn_out: amounts.tkn_out,
            amount_out: amounts.amount_out,
        })
        .collect();
    Some(Opportunity {
        hops,
        tkn: tkn.clone(),
        amount_in,
        profit,
        price_transport,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::arb::test_helpers::*;

    #[test]
    fn test_finder_kind() {
        for (kind, name) in [
            (FinderKind::Pairwise, "pairwise"),
            (FinderKind::Triangular, "triangular"),
            (FinderKind::Graph, "graph"),
        ] {
            assert_eq!(kind.to_string(), name);
            assert_eq!(kind.finder().name(), name);
            assert_eq!(
                serde_json::from_str::<FinderKind>(&format!("\"{name}\"")).unwrap(),
                kind
            );
        }
        assert_eq!(FinderKind::default(), FinderKind::Graph);
    }

    #[test]
    fn test_threshold_prunes_paths() {
        let curves = container(&[
            ("A", ("WETH", 18), ("USDC", 6), 1000, 3_000_000, "0.003"),
            ("B", ("WETH", 18), ("USDC", 6), 1000, 3_030_000, "0.003"),
        ]);
        let mut config = FinderConfig {
            flashloan_tokens: vec![TokenId::from("USDC")],
            ..FinderConfig::default()
        };
        // 1% spread, about 0.4% after two fees
        assert_eq!(scan(&curves, &config, &[2]).len(), 1);
        config.threshold = 0.01;
        assert!(scan(&curves, &config, &[2]).is_empty());
    }
}
