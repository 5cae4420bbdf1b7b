//! # Curve container
//!
//! Indexed collection of curves. Curves are stored behind `Arc` so that selections,
//! sub-containers and trade instructions can share them without copying pool state.
//! Read operations never mutate the container; the result shape is picked by the caller
//! through `ResultMode`.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt::{self, Debug};
use std::sync::Arc;

use log::debug;

use super::pair::Pair;
use super::pool::Curve;
use super::token::{Token, TokenId};
use crate::errors::ContainerError;

/// Numeric curve parameters usable in predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    /// Swap fee
    Fee,
    /// Mid price of token0 in token1
    MidPrice,
    /// Payable holdings of token0, token units
    Holdings0,
    /// Payable holdings of token1, token units
    Holdings1,
    /// Constant-product reserve of token0, wei
    Reserve0,
    /// Constant-product reserve of token1, wei
    Reserve1,
    /// Concentrated-liquidity active liquidity
    Liquidity,
    /// Concentrated-liquidity current tick
    Tick,
    /// Carbon liquidity of `order0`, wei
    Y0,
    /// Carbon liquidity of `order1`, wei
    Y1,
}

/// Comparison operators for `Predicate::Param`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// Approximately equal: `|value / reference - 1| < 1e-6`
    Ae,
}

impl Cmp {
    /// Compares a curve's `value` against `reference`.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn eval(self, value: f64, reference: f64) -> bool {
        match self {
            Self::Eq => value == reference,
            Self::Ne => value != reference,
            Self::Lt => value < reference,
            Self::Le => value <= reference,
            Self::Gt => value > reference,
            Self::Ge => value >= reference,
            Self::Ae if reference == 0.0 => value == 0.0,
            Self::Ae => (value / reference - 1.0).abs() < 1e-6,
        }
    }
}

/// Boolean filter over curves.
#[derive(Clone)]
pub enum Predicate {
    /// Compares one parameter. Curves without the parameter never match.
    Param(Param, Cmp, f64),
    /// All inner predicates match
    And(Vec<Predicate>),
    /// At least one inner predicate matches
    Or(Vec<Predicate>),
    /// The inner predicate does not match
    Not(Box<Predicate>),
    /// Arbitrary closure
    Custom(Arc<dyn Fn(&Curve) -> bool + Send + Sync>),
}

impl Predicate {
    /// Shorthand for `Predicate::Param`.
    #[must_use]
    pub const fn param(param: Param, cmp: Cmp, reference: f64) -> Self {
        Self::Param(param, cmp, reference)
    }

    /// Wraps a closure.
    pub fn custom(f: impl Fn(&Curve) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    /// Conjunction with another predicate.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut inner) => {
                inner.push(other);
                Self::And(inner)
            }
            this => Self::And(vec![this, other]),
        }
    }

    /// Disjunction with another predicate.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match self {
            Self::Or(mut inner) => {
                inner.push(other);
                Self::Or(inner)
            }
            this => Self::Or(vec![this, other]),
        }
    }

    /// Negation.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Evaluates the predicate on a curve.
    #[must_use]
    pub fn matches(&self, curve: &Curve) -> bool {
        match self {
            Self::Param(param, cmp, reference) => curve
                .param(*param)
                .is_some_and(|value| cmp.eval(value, *reference)),
            Self::And(inner) => inner.iter().all(|p| p.matches(curve)),
            Self::Or(inner) => inner.iter().any(|p| p.matches(curve)),
            Self::Not(inner) => !inner.matches(curve),
            Self::Custom(f) => f(curve),
        }
    }
}

impl Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Param(param, cmp, reference) => write!(f, "{param:?} {cmp:?} {reference}"),
            Self::And(inner) => write!(f, "And{inner:?}"),
            Self::Or(inner) => write!(f, "Or{inner:?}"),
            Self::Not(inner) => write!(f, "Not({inner:?})"),
            Self::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// How a read operation returns its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultMode {
    /// A lazy iterator over the matches
    Iter,
    /// A vector of the matches
    #[default]
    Tuple,
    /// A new, unfrozen container holding the matches
    Container,
}

/// Result of a container read, shaped by `ResultMode`.
pub enum Selection<'a> {
    /// Lazy matches
    Iter(Box<dyn Iterator<Item = Arc<Curve>> + 'a>),
    /// Collected matches
    Tuple(Vec<Arc<Curve>>),
    /// Matches as a new container
    Container(CurveContainer),
}

impl Selection<'_> {
    /// Collects the selection into a vector, whatever its shape.
    #[must_use]
    pub fn into_vec(self) -> Vec<Arc<Curve>> {
        match self {
            Self::Iter(iter) => iter.collect(),
            Self::Tuple(curves) => curves,
            Self::Container(container) => container.curves,
        }
    }
}

/// Pair filters for `CurveContainer::filter_pairs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterCondition {
    /// Both tokens are in the set
    BothIn,
    /// At least one token is in the set
    OneIn,
    /// Neither token is in the set
    NotIn,
    /// The base token is in the set
    BaseIn,
    /// The quote token is in the set
    QuoteIn,
}

/// Indexed, optionally frozen collection of curves.
#[derive(Clone, Default)]
pub struct CurveContainer {
    /// Curves in insertion order
    curves: Vec<Arc<Curve>>,
    /// cid -> position
    by_cid: HashMap<String, usize>,
    /// primary pair -> positions
    by_primary: HashMap<Pair, Vec<usize>>,
    /// Rejects mutation when set
    frozen: bool,
}

impl CurveContainer {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a container from curves.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::DuplicateCid` if two curves share a cid
    pub fn from_curves(curves: impl IntoIterator<Item = Curve>) -> Result<Self, ContainerError> {
        let mut container = Self::new();
        container.add_all(curves)?;
        Ok(container)
    }

    /// Builds an unfrozen container over already shared curves
    fn from_shared(curves: impl IntoIterator<Item = Arc<Curve>>) -> Self {
        let mut container = Self::new();
        for curve in curves {
            container.index(curve);
        }
        container
    }

    /// Appends a curve and updates the indices
    fn index(&mut self, curve: Arc<Curve>) {
        let position = self.curves.len();
        self.by_cid.insert(curve.cid.clone(), position);
        self.by_primary
            .entry(curve.primary())
            .or_default()
            .push(position);
        self.curves.push(curve);
    }

    /// Adds a curve. An empty cid is replaced by the curve's insertion position.
    ///
    /// # Errors
    ///
    /// * `ContainerError::Frozen` after `freeze()`
    /// * `ContainerError::DuplicateCid` if the cid is already taken
    pub fn add(&mut self, mut curve: Curve) -> Result<Arc<Curve>, ContainerError> {
        if self.frozen {
            return Err(ContainerError::Frozen);
        }
        if curve.cid.is_empty() {
            curve.cid = self.curves.len().to_string();
        }
        if self.by_cid.contains_key(&curve.cid) {
            return Err(ContainerError::DuplicateCid(curve.cid));
        }
        let curve = Arc::new(curve);
        self.index(Arc::clone(&curve));
        Ok(curve)
    }

    /// Adds every curve of an iterator, stopping at the first error.
    ///
    /// # Errors
    ///
    /// See `add`
    pub fn add_all(
        &mut self,
        curves: impl IntoIterator<Item = Curve>,
    ) -> Result<(), ContainerError> {
        for curve in curves {
            self.add(curve)?;
        }
        Ok(())
    }

    /// Forbids further mutation.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Whether the container is frozen.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Number of curves.
    #[must_use]
    pub fn len(&self) -> usize {
        self.curves.len()
    }

    /// Whether the container holds no curve.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    /// Iterates over the curves in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Curve>> {
        self.curves.iter()
    }

    /// Shapes a set of matches according to `mode`
    fn select<'a>(
        mode: ResultMode,
        matches: impl Iterator<Item = Arc<Curve>> + 'a,
    ) -> Selection<'a> {
        match mode {
            ResultMode::Iter => Selection::Iter(Box::new(matches)),
            ResultMode::Tuple => Selection::Tuple(matches.collect()),
            ResultMode::Container => Selection::Container(Self::from_shared(matches)),
        }
    }

    /// Returns the curve with the given cid.
    #[must_use]
    pub fn by_cid(&self, cid: &str) -> Option<Arc<Curve>> {
        self.by_cid.get(cid).map(|&i| Arc::clone(&self.curves[i]))
    }

    /// Returns the curves with the given cids. Unknown cids are skipped.
    pub fn by_cids<'a>(&'a self, cids: &'a [&str], mode: ResultMode) -> Selection<'a> {
        Self::select(mode, cids.iter().filter_map(move |cid| self.by_cid(cid)))
    }

    /// Returns the curves trading `pair`.
    ///
    /// With `directed`, only curves whose `tkn0/tkn1` order equals `pair` match;
    /// otherwise either direction matches.
    pub fn by_pair<'a>(&'a self, pair: &Pair, directed: bool, mode: ResultMode) -> Selection<'a> {
        let positions: Vec<usize> = self
            .by_primary
            .get(pair)
            .or_else(|| self.by_primary.get(&pair.reversed()))
            .cloned()
            .unwrap_or_default();
        let pair = pair.clone();
        Self::select(
            mode,
            positions
                .into_iter()
                .map(move |i| &self.curves[i])
                .filter(move |curve| !directed || curve.pair() == pair)
                .cloned(),
        )
    }

    /// Returns the curves containing `tkn`.
    pub fn by_tkn<'a>(&'a self, tkn: &'a TokenId, mode: ResultMode) -> Selection<'a> {
        Self::select(
            mode,
            self.curves
                .iter()
                .filter(move |curve| curve.contains(tkn))
                .cloned(),
        )
    }

    /// Returns the curves containing at least one of `tkns`.
    pub fn by_tkns<'a>(&'a self, tkns: &'a [TokenId], mode: ResultMode) -> Selection<'a> {
        Self::select(
            mode,
            self.curves
                .iter()
                .filter(move |curve| tkns.iter().any(|tkn| curve.contains(tkn)))
                .cloned(),
        )
    }

    /// Returns the curves matching `predicate`.
    pub fn by_params<'a>(&'a self, predicate: &'a Predicate, mode: ResultMode) -> Selection<'a> {
        Self::select(
            mode,
            self.curves
                .iter()
                .filter(move |curve| predicate.matches(curve))
                .cloned(),
        )
    }

    /// Distinct pairs, in primary direction when `standardize` is set.
    #[must_use]
    pub fn pairs(&self, standardize: bool) -> BTreeSet<Pair> {
        if standardize {
            self.by_primary.keys().cloned().collect()
        } else {
            self.curves.iter().map(|curve| curve.pair()).collect()
        }
    }

    /// Distinct tokens.
    #[must_use]
    pub fn tokens(&self) -> BTreeSet<TokenId> {
        self.curves
            .iter()
            .flat_map(|curve| [curve.tkn0.address.clone(), curve.tkn1.address.clone()])
            .collect()
    }

    /// Token descriptions by address.
    #[must_use]
    pub fn token_map(&self) -> HashMap<TokenId, Token> {
        self.curves
            .iter()
            .flat_map(|curve| [curve.tkn0.clone(), curve.tkn1.clone()])
            .map(|token| (token.address.clone(), token))
            .collect()
    }

    /// Primary pairs whose tokens satisfy `condition` against `tkns`.
    #[must_use]
    pub fn filter_pairs(&self, condition: FilterCondition, tkns: &[TokenId]) -> BTreeSet<Pair> {
        let tkns: HashSet<&TokenId> = tkns.iter().collect();
        self.by_primary
            .keys()
            .filter(|pair| {
                let (base_in, quote_in) = (tkns.contains(&pair.base), tkns.contains(&pair.quote));
                match condition {
                    FilterCondition::BothIn => base_in && quote_in,
                    FilterCondition::OneIn => base_in || quote_in,
                    FilterCondition::NotIn => !base_in && !quote_in,
                    FilterCondition::BaseIn => base_in,
                    FilterCondition::QuoteIn => quote_in,
                }
            })
            .cloned()
            .collect()
    }

    /// Lowest-fee curve between two tokens
    fn cheapest(&self, a: &TokenId, b: &TokenId) -> Option<Arc<Curve>> {
        self.by_pair(&Pair::new(a.clone(), b.clone()), false, ResultMode::Iter)
            .into_vec()
            .into_iter()
            .min_by(|x, y| x.fee.cmp(&y.fee))
    }

    /// Mid price of `base` in `quote` on a single curve
    fn direct_price(curve: &Curve, base: &TokenId) -> f64 {
        let price = curve.mid_price();
        if &curve.tkn0.address == base {
            price
        } else if price > 0.0 {
            1.0 / price
        } else {
            0.0
        }
    }

    /// Approximate price of `pair.base` in units of `pair.quote`.
    ///
    /// Uses the lowest-fee curve on the pair; without one, walks the token graph from
    /// the quote token. Only meant for rough valuation.
    #[must_use]
    pub fn price_for_pair(&self, pair: &Pair) -> Option<f64> {
        if pair.base == pair.quote {
            return Some(1.0);
        }
        if let Some(curve) = self.cheapest(&pair.base, &pair.quote) {
            return Some(Self::direct_price(&curve, &pair.base));
        }
        self.all_prices(&pair.quote).get(&pair.base).copied()
    }

    /// Approximate prices of every reachable token in units of `numeraire`.
    ///
    /// Walks outward breadth first from `numeraire`, pricing each token through the
    /// first token it was reached from.
    #[must_use]
    pub fn all_prices(&self, numeraire: &TokenId) -> HashMap<TokenId, f64> {
        let mut prices = HashMap::from([(numeraire.clone(), 1.0)]);
        let mut queue = VecDeque::from([numeraire.clone()]);
        while let Some(tkn) = queue.pop_front() {
            let tkn_price = prices[&tkn];
            let neighbours: BTreeSet<TokenId> = self
                .by_tkn(&tkn, ResultMode::Iter)
                .into_vec()
                .iter()
                .filter_map(|curve| curve.pair().other(&tkn).cloned())
                .collect();
            for other in neighbours {
                if prices.contains_key(&other) {
                    continue;
                }
                let Some(curve) = self.cheapest(&other, &tkn) else {
                    continue;
                };
                let price = Self::direct_price(&curve, &other) * tkn_price;
                debug!("price of {other} in {numeraire}: {price} via {tkn}");
                prices.insert(other.clone(), price);
                queue.push_back(other);
            }
        }
        prices
    }
}

impl Debug for CurveContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CurveContainer({} curves, {} pairs{})",
            self.curves.len(),
            self.by_primary.len(),
            if self.frozen { ", frozen" } else { "" }
        )
    }
}
