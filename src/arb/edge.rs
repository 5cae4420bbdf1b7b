use std::collections::HashMap;
use std::sync::Arc;

use super::container::CurveContainer;
use super::pool::{Curve, Direction};
use super::token::TokenId;
use super::transport::PathStep;

/// Curves able to move `tkn_in -> tkn_out`, for every directed edge of the token graph.
#[derive(Debug, Clone, Default)]
pub struct EdgeContainer {
    /// `(tkn_in, tkn_out)` -> steps trading in that direction
    edges: HashMap<(TokenId, TokenId), Vec<PathStep>>,
}

impl EdgeContainer {
    /// Indexes both directions of every curve.
    #[must_use]
    pub fn from_container(curves: &CurveContainer) -> Self {
        let mut edges: HashMap<(TokenId, TokenId), Vec<PathStep>> = HashMap::new();
        for curve in curves.iter() {
            for direction in [Direction::ZeroForOne, Direction::OneForZero] {
                let step = PathStep::new(Arc::clone(curve), direction);
                edges
                    .entry((step.tkn_in().clone(), step.tkn_out().clone()))
                    .or_default()
                    .push(step);
            }
        }
        Self { edges }
    }

    /// Steps trading `tkn_in -> tkn_out`, empty if none.
    #[must_use]
    pub fn steps(&self, tkn_in: &TokenId, tkn_out: &TokenId) -> &[PathStep] {
        self.edges
            .get(&(tkn_in.clone(), tkn_out.clone()))
            .map_or(&[], Vec::as_slice)
    }

    /// Curves trading `tkn_in -> tkn_out`.
    #[must_use]
    pub fn curves(&self, tkn_in: &TokenId, tkn_out: &TokenId) -> Vec<Arc<Curve>> {
        self.steps(tkn_in, tkn_out)
            .iter()
            .map(|step| Arc::clone(&step.curve))
            .collect()
    }

    /// Best marginal price over the curves of an edge, with the step offering it.
    #[must_use]
    pub fn max_price(&self, tkn_in: &TokenId, tkn_out: &TokenId) -> Option<(f64, &PathStep)> {
        self.steps(tkn_in, tkn_out)
            .iter()
            .map(|step| (step.price(), step))
            .max_by(|a, b| a.0.total_cmp(&b.0))
    }

    /// Number of directed edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether there is no edge at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
