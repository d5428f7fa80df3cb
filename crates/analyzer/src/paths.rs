//! Simple-path and prime-path enumeration
//!
//! Prime paths are the structural units of prime-path coverage: simple paths
//! that are not contained in any other simple path. Enumeration is exhaustive
//! depth-first search over every ordered node pair. Exponential in dense
//! graphs, which is acceptable for single-procedure CFGs; a deployment running
//! this on adversarial inputs should bound the search.

use crate::cfg::{ControlFlowGraph, NodeId};
use rustc_hash::FxHashSet;

impl ControlFlowGraph {
    /// Every simple path between every ordered pair of nodes
    ///
    /// Includes trivial single-node paths. Deterministic: nodes are visited in
    /// id order and successors in next/branch/orelse/case order.
    pub fn simple_paths(&self) -> Vec<Vec<NodeId>> {
        let ids = self.sorted_ids();
        let mut paths = Vec::new();
        let mut seen: FxHashSet<Vec<NodeId>> = FxHashSet::default();

        for &start in &ids {
            for &end in &ids {
                for path in self.simple_paths_between(start, end) {
                    if seen.insert(path.clone()) {
                        paths.push(path);
                    }
                }
            }
        }

        paths
    }

    /// Simple paths that are not a contiguous sub-sequence of any other
    pub fn prime_paths(&self) -> Vec<Vec<NodeId>> {
        let all = self.simple_paths();

        all.iter()
            .filter(|path| {
                !all.iter()
                    .any(|other| other.len() > path.len() && contains_subpath(other, path))
            })
            .cloned()
            .collect()
    }

    /// All simple paths from `start` to `end`, found with an explicit DFS stack
    fn simple_paths_between(&self, start: NodeId, end: NodeId) -> Vec<Vec<NodeId>> {
        let mut stack = vec![(start, vec![start])];
        let mut found = Vec::new();

        while let Some((current, path)) = stack.pop() {
            if current == end {
                found.push(path.clone());
            }

            for successor in self.successors(current) {
                if !path.contains(&successor) {
                    let mut extended = path.clone();
                    extended.push(successor);
                    stack.push((successor, extended));
                }
            }
        }

        found
    }
}

fn contains_subpath(path: &[NodeId], candidate: &[NodeId]) -> bool {
    path.windows(candidate.len()).any(|window| window == candidate)
}
