//! # Pair graph
//!
//! Undirected token graph with one edge per primary pair. Circuit enumeration over
//! this graph is the combinatorial core of the triangular and graph finders.

use std::collections::{BTreeSet, HashMap, HashSet};

use log::debug;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;

use super::container::CurveContainer;
use super::pair::Pair;
use super::token::TokenId;

/// Token graph built from a set of pairs. Rebuilt, never updated in place.
#[derive(Debug, Clone, Default)]
pub struct PairGraph {
    /// Tokens as nodes, primary pairs as edges
    graph: UnGraph<TokenId, Pair>,
    /// Token -> node
    nodes: HashMap<TokenId, NodeIndex>,
}

impl PairGraph {
    /// Builds the graph from pairs. Pairs over the same two tokens share one edge.
    #[must_use]
    pub fn from_pairs(pairs: impl IntoIterator<Item = Pair>) -> Self {
        let mut this = Self::default();
        let mut seen = HashSet::new();
        for pair in pairs {
            if pair.base == pair.quote {
                continue;
            }
            let key = if pair.base < pair.quote {
                pair.clone()
            } else {
                pair.reversed()
            };
            if !seen.insert(key) {
                continue;
            }
            let a = this.node(&pair.base);
            let b = this.node(&pair.quote);
            this.graph.add_edge(a, b, pair);
        }
        debug!(
            "pair graph: {} tokens, {} pairs",
            this.graph.node_count(),
            this.graph.edge_count()
        );
        this
    }

    /// Builds the graph over the primary pairs of a container.
    #[must_use]
    pub fn from_container(curves: &CurveContainer) -> Self {
        Self::from_pairs(curves.pairs(true))
    }

    /// Returns the node of a token, adding it if needed
    fn node(&mut self, tkn: &TokenId) -> NodeIndex {
        if let Some(&index) = self.nodes.get(tkn) {
            return index;
        }
        let index = self.graph.add_node(tkn.clone());
        self.nodes.insert(tkn.clone(), index);
        index
    }

    /// Number of tokens.
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct pairs.
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Tokens sharing a pair with `tkn`, sorted.
    #[must_use]
    pub fn neighbors(&self, tkn: &TokenId) -> BTreeSet<TokenId> {
        self.nodes
            .get(tkn)
            .map(|&index| {
                self.graph
                    .neighbors(index)
                    .map(|n| self.graph[n].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Tokens connected to `tkn` by any path, `tkn` included.
    #[must_use]
    pub fn reachable(&self, tkn: &TokenId) -> BTreeSet<TokenId> {
        let Some(&start) = self.nodes.get(tkn) else {
            return BTreeSet::new();
        };
        let mut bfs = Bfs::new(&self.graph, start);
        let mut found = BTreeSet::new();
        while let Some(index) = bfs.next(&self.graph) {
            found.insert(self.graph[index].clone());
        }
        found
    }

    /// Enumerates the simple cycles through `target` with exactly `length` edges.
    ///
    /// Every cycle is returned once, as a node path starting and ending at `target`,
    /// in the orientation where the second token sorts before the second to last.
    /// Length 2 yields `[target, neighbor, target]` for every neighbor. The result is
    /// sorted.
    #[must_use]
    pub fn circuits(&self, target: &TokenId, length: usize) -> Vec<Vec<TokenId>> {
        if length < 2 || !self.nodes.contains_key(target) {
            return Vec::new();
        }
        if length == 2 {
            return self
                .neighbors(target)
                .into_iter()
                .map(|n| vec![target.clone(), n, target.clone()])
                .collect();
        }

        let mut circuits = Vec::new();
        let mut path = vec![target.clone()];
        self.extend_circuits(target, length, &mut path, &mut circuits);
        circuits.sort();
        circuits
    }

    /// Depth-first extension of `path` toward cycles closing at `target`
    fn extend_circuits(
        &self,
        target: &TokenId,
        length: usize,
        path: &mut Vec<TokenId>,
        circuits: &mut Vec<Vec<TokenId>>,
    ) {
        let Some(last) = path.last().cloned() else {
            return;
        };
        let neighbors = self.neighbors(&last);
        if path.len() == length {
            // the orientation check drops the mirrored copy of each cycle
            if neighbors.contains(target) && path[1] < path[length - 1] {
                let mut circuit = path.clone();
                circuit.push(target.clone());
                circuits.push(circuit);
            }
            return;
        }
        for next in neighbors {
            if path.contains(&next) {
                continue;
            }
            path.push(next);
            self.extend_circuits(target, length, path, circuits);
            path.pop();
        }
    }

    /// Splits a node path into its directed `(tkn_in, tkn_out)` edges.
    #[must_use]
    pub fn path_to_edges(path: &[TokenId]) -> Vec<(TokenId, TokenId)> {
        path.windows(2)
            .map(|w| (w[0].clone(), w[1].clone()))
            .collect()
    }
}
