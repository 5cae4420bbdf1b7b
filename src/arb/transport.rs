//! # Token transport and trade sizing
//!
//! A path of curves "transports" an amount of the opening token to the closing token.
//! The optimizers size the opening amount on the `f64` transport view of the curves:
//! `ttx_max_amt` finds the largest amount every curve can absorb and `ttx_opt_amt` the
//! amount maximizing `amount_out - amount_in`.

use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use itertools::Itertools;
use log::{debug, warn};

use super::edge::EdgeContainer;
use super::pool::{Curve, Direction};
use super::token::TokenId;

/// One hop of a path: a curve traded in a fixed direction.
#[derive(Clone)]
pub struct PathStep {
    /// The curve
    pub curve: Arc<Curve>,
    /// Trade direction through the curve
    pub direction: Direction,
}

impl PathStep {
    /// Creates a step.
    #[must_use]
    pub const fn new(curve: Arc<Curve>, direction: Direction) -> Self {
        Self { curve, direction }
    }

    /// Token sold into the curve.
    #[must_use]
    pub fn tkn_in(&self) -> &TokenId {
        &self.curve.tokens(self.direction).0.address
    }

    /// Token bought from the curve.
    #[must_use]
    pub fn tkn_out(&self) -> &TokenId {
        &self.curve.tokens(self.direction).1.address
    }

    /// Marginal price of the step, net of fee.
    #[must_use]
    pub fn price(&self) -> f64 {
        self.curve.price(self.direction)
    }
}

impl Debug for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{:?}]", self.curve.cid, self.direction)
    }
}

/// A step would need more input than its curve can absorb.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityExceeded {
    /// Amount offered to the curve
    pub amt_in: f64,
    /// Largest amount the curve absorbs
    pub max_in: f64,
    /// Token offered
    pub tkn_in: TokenId,
    /// Output at `max_in`
    pub max_out: f64,
    /// Token paid out
    pub tkn_out: TokenId,
    /// Curve that ran out of capacity
    pub cid: String,
}

impl Display for CapacityExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "capacity exceeded on {}: {} {} > max {} {} (max out {} {})",
            self.cid, self.amt_in, self.tkn_in, self.max_in, self.tkn_in, self.max_out, self.tkn_out
        )
    }
}

/// Result of transporting an amount along a path.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportOutcome {
    /// Amount received at the end of the path
    Ok(f64),
    /// A step ran out of capacity
    Clamped(CapacityExceeded),
}

impl TransportOutcome {
    /// The received amount, or the clamped step's maximum output.
    #[must_use]
    pub const fn value(&self) -> f64 {
        match self {
            Self::Ok(amount) => *amount,
            Self::Clamped(exceeded) => exceeded.max_out,
        }
    }

    /// Whether every step absorbed its input.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// Amounts in and out of one step of a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct StepAmounts {
    /// Curve traded
    pub cid: String,
    /// Token sold
    pub tkn_in: TokenId,
    /// Amount sold
    pub amount_in: f64,
    /// Token bought
    pub tkn_out: TokenId,
    /// Amount bought
    pub amount_out: f64,
}

/// A path with exactly one curve per edge.
#[derive(Clone)]
pub struct ExplodedPath {
    /// Steps in trade order
    pub steps: Vec<PathStep>,
}

impl ExplodedPath {
    /// Creates a path from steps.
    #[must_use]
    pub const fn new(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }

    /// Opening token, `None` for an empty path.
    #[must_use]
    pub fn tkn_in(&self) -> Option<&TokenId> {
        self.steps.first().map(PathStep::tkn_in)
    }

    /// Closing token, `None` for an empty path.
    #[must_use]
    pub fn tkn_out(&self) -> Option<&TokenId> {
        self.steps.last().map(PathStep::tkn_out)
    }

    /// Curve ids in trade order.
    #[must_use]
    pub fn cids(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.curve.cid.as_str()).collect()
    }

    /// Whether the same curve is traded twice in a row.
    #[must_use]
    pub fn reuses_curve(&self) -> bool {
        self.steps
            .iter()
            .tuple_windows()
            .any(|(a, b)| a.curve.cid == b.curve.cid)
    }

    /// Whether any curve has a finite capacity.
    #[must_use]
    pub fn is_levered(&self) -> bool {
        self.steps.iter().any(|step| !step.curve.is_unlevered())
    }

    /// Product of the marginal prices along the path.
    #[must_use]
    pub fn price_transport(&self) -> f64 {
        self.steps.iter().map(PathStep::price).product()
    }

    /// Transports `amount_in` through every step.
    ///
    /// # Errors
    ///
    /// Returns the first step that cannot absorb its input
    pub fn transport_detail(&self, amount_in: f64) -> Result<Vec<StepAmounts>, CapacityExceeded> {
        let mut amount = amount_in;
        let mut detail = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let Some(amount_out) = step.curve.dtkn_out(step.direction, amount) else {
                return Err(CapacityExceeded {
                    amt_in: amount,
                    max_in: step.curve.max_in(step.direction).unwrap_or(f64::INFINITY),
                    tkn_in: step.tkn_in().clone(),
                    max_out: step.curve.max_out(step.direction),
                    tkn_out: step.tkn_out().clone(),
                    cid: step.curve.cid.clone(),
                });
            };
            detail.push(StepAmounts {
                cid: step.curve.cid.clone(),
                tkn_in: step.tkn_in().clone(),
                amount_in: amount,
                tkn_out: step.tkn_out().clone(),
                amount_out,
            });
            amount = amount_out;
        }
        Ok(detail)
    }

    /// Amount received for `amount_in`, or the clamp that stopped it.
    #[must_use]
    pub fn transport(&self, amount_in: f64) -> TransportOutcome {
        match self.transport_detail(amount_in) {
            Ok(detail) => TransportOutcome::Ok(detail.last().map_or(amount_in, |s| s.amount_out)),
            Err(exceeded) => TransportOutcome::Clamped(exceeded),
        }
    }

    /// `amount_out - amount_in`, using the clamped value when capacity runs out.
    #[must_use]
    pub fn gain(&self, amount_in: f64) -> f64 {
        self.transport(amount_in).value() - amount_in
    }
}

impl Debug for ExplodedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.steps)
    }
}

/// Expands a token path into every combination of one curve per edge.
///
/// Combinations trading the same curve twice in a row are dropped.
#[must_use]
pub fn explode(path: &[TokenId], edges: &EdgeContainer) -> Vec<ExplodedPath> {
    if path.len() < 2 {
        return Vec::new();
    }
    path.iter()
        .tuple_windows()
        .map(|(tkn_in, tkn_out)| edges.steps(tkn_in, tkn_out).to_vec())
        .multi_cartesian_product()
        .map(ExplodedPath::new)
        .filter(|exploded| !exploded.reuses_curve())
        .collect()
}

/// Outcome of an optimizer run. Failures are reported in `errormsg`, never raised.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerResult {
    /// Optimal (or best found) opening amount
    pub result: Option<f64>,
    /// Why the optimizer failed or did not converge
    pub errormsg: Option<String>,
    /// Iterations used
    pub iterations: usize,
}

impl OptimizerResult {
    /// A converged result
    const fn success(result: f64, iterations: usize) -> Self {
        Self {
            result: Some(result),
            errormsg: None,
            iterations,
        }
    }

    /// A failed run
    fn error(message: impl Into<String>, iterations: usize) -> Self {
        Self {
            result: None,
            errormsg: Some(message.into()),
            iterations,
        }
    }

    /// Whether the run failed or did not converge.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.errormsg.is_some()
    }
}

/// Sizes trades along an exploded path.
#[derive(Debug, Clone, Copy)]
pub struct Optimizer {
    /// Iteration cap of every search loop
    pub max_iterations: usize,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
        }
    }
}

/// Relative distance at which the boundary of a levered path is tested
const BOUNDARY_EPSILON: f64 = 1e-2;

impl Optimizer {
    /// Creates an optimizer with an iteration cap.
    #[must_use]
    pub const fn new(max_iterations: usize) -> Self {
        Self { max_iterations }
    }

    /// Largest opening amount the path can absorb without clamping.
    ///
    /// The search is bracketed by the first levered curve's `max_in`, discounted by the
    /// price transport up to that curve, and bisects until `hi / lo - 1 < 1%`. The
    /// returned amount is the feasible lower bracket.
    #[must_use]
    pub fn ttx_max_amt(&self, path: &ExplodedPath) -> OptimizerResult {
        let Some(first_levered) = path.steps.iter().position(|s| !s.curve.is_unlevered()) else {
            return OptimizerResult::error("all curves are unlevered", 0);
        };
        let step = &path.steps[first_levered];
        let fl_price: f64 = path.steps[..first_levered].iter().map(PathStep::price).product();
        let max_in = step.curve.max_in(step.direction).unwrap_or(0.0);
        if fl_price <= 0.0 || max_in <= 0.0 {
            return OptimizerResult::error(format!("no capacity on curve {}", step.curve.cid), 0);
        }

        let mut hi = max_in / fl_price;
        if path.transport(hi).is_ok() {
            return OptimizerResult::success(hi, 0);
        }
        let mut lo = 1e-100;
        for iteration in 1..=self.max_iterations {
            if hi / lo - 1.0 < 0.01 {
                debug!("ttx_max_amt converged to {lo} after {iteration} iterations");
                return OptimizerResult::success(lo, iteration);
            }
            let mid = (lo + hi) / 2.0;
            if path.transport(mid).is_ok() {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        OptimizerResult {
            result: Some(lo),
            errormsg: Some(format!(
                "ttx_max_amt did not converge after {} iterations",
                self.max_iterations
            )),
            iterations: self.max_iterations,
        }
    }

    /// Opening amount maximizing `amount_out - amount_in` along the path.
    ///
    /// Levered paths either accept the capacity boundary (profit still rising at the
    /// maximum amount) or goal-seek the zero of the marginal profit below it. Unlevered
    /// paths start from 10% of the first curve's holdings and widen the bracket until
    /// the marginal profit turns negative.
    #[must_use]
    pub fn ttx_opt_amt(&self, path: &ExplodedPath) -> OptimizerResult {
        if path.is_levered() {
            let max = self.ttx_max_amt(path);
            let Some(max_amt) = max.result else {
                return max;
            };
            if path.gain(max_amt * (1.0 - BOUNDARY_EPSILON)) < path.gain(max_amt) {
                debug!("{path:?}: optimum at capacity boundary {max_amt}");
                return OptimizerResult::success(max_amt, max.iterations);
            }
            let mut result = self.goal_seek(path, 0.0, max_amt, max_amt / 3.0);
            result.iterations += max.iterations;
            return result;
        }

        let Some(first) = path.steps.first() else {
            return OptimizerResult::error("empty path", 0);
        };
        let start = 0.1 * first.curve.holdings(first.tkn_in());
        if start <= 0.0 {
            return OptimizerResult::error(
                format!("curve {} holds no {}", first.curve.cid, first.tkn_in()),
                0,
            );
        }
        let (mut lo, mut hi) = (0.0, start);
        let mut iterations = 0;
        while Self::slope(path, hi) > 0.0 {
            iterations += 1;
            if iterations >= self.max_iterations {
                warn!("{path:?}: could not bracket the optimum");
                return OptimizerResult::error("could not bracket the optimum", iterations);
            }
            lo = hi;
            hi *= 2.0;
        }
        let mut result = self.goal_seek(path, lo, hi, (lo + hi) / 2.0);
        result.iterations += iterations;
        result
    }

    /// Forward-difference marginal profit at `x`
    fn slope(path: &ExplodedPath, x: f64) -> f64 {
        let h = (x * 1e-6).max(1e-12);
        (path.gain(x + h) - path.gain(x)) / h
    }

    /// Bisects `[lo, hi]` for the zero of the marginal profit, first probing `start`
    fn goal_seek(
        &self,
        path: &ExplodedPath,
        mut lo: f64,
        mut hi: f64,
        start: f64,
    ) -> OptimizerResult {
        let mut x = start;
        for iteration in 1..=self.max_iterations {
            if Self::slope(path, x) > 0.0 {
                lo = x;
            } else {
                hi = x;
            }
            if hi - lo <= 1e-9 * hi.max(1e-12) {
                return OptimizerResult::success(lo, iteration);
            }
            x = (lo + hi) / 2.0;
        }
        warn!(
            "{path:?}: goal seek did not converge after {} iterations",
            self.max_iterations
        );
        OptimizerResult {
            result: Some(lo),
            errormsg: Some(format!(
                "goal seek did not converge after {} iterations",
                self.max_iterations
            )),
            iterations: self.max_iterations,
        }
    }
}
