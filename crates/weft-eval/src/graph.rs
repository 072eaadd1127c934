//! Dependency graph over operator calls.
//!
//! Nodes are operator calls in document order; an edge i → j means call
//! i waits for call j because one of i's dependency cursors overlaps
//! j's destination subtree. Cycle detection is a three-color depth-first
//! search that reports every cursor on the cycle; ordering is Kahn's
//! algorithm with document order breaking ties, so independent calls
//! always run in a predictable sequence.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use weft_tree::Cursor;
use weft_util::{Error, Result};

/// Dependency relation over calls indexed `0..n` in document order.
pub struct DepGraph {
    /// `deps[i]` - calls that must finish before call i runs.
    deps: Vec<Vec<usize>>,
    /// `dependents[i]` - calls waiting on call i.
    dependents: Vec<Vec<usize>>,
}

impl DepGraph {
    /// Build the relation from each call's destination and dependency
    /// cursors. A dependency on any cursor overlapping another call's
    /// destination subtree orders the two.
    pub fn build(dests: &[Cursor], deps: &[Vec<Cursor>]) -> Self {
        let n = dests.len();
        let mut graph = DepGraph {
            deps: vec![Vec::new(); n],
            dependents: vec![Vec::new(); n],
        };

        for (i, cursors) in deps.iter().enumerate() {
            for cursor in cursors {
                for (j, dest) in dests.iter().enumerate() {
                    if i != j && cursor.overlaps(dest) && !graph.deps[i].contains(&j) {
                        graph.deps[i].push(j);
                        graph.dependents[j].push(i);
                    }
                }
            }
        }

        graph
    }

    /// Number of calls.
    pub fn len(&self) -> usize {
        self.deps.len()
    }

    /// True with no calls.
    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    /// The calls that must finish before call `i`.
    pub fn dependencies_of(&self, i: usize) -> &[usize] {
        &self.deps[i]
    }

    /// Fail with a cycle error naming every cursor on the cycle.
    pub fn check_cycles(&self, dests: &[Cursor]) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let n = self.deps.len();
        let mut colors = vec![Color::White; n];
        let mut path: Vec<usize> = Vec::new();

        // Iterative DFS; an edge into a gray node closes a cycle.
        fn visit(
            node: usize,
            deps: &[Vec<usize>],
            colors: &mut [Color],
            path: &mut Vec<usize>,
            dests: &[Cursor],
        ) -> Result<()> {
            colors[node] = Color::Gray;
            path.push(node);

            for &next in &deps[node] {
                match colors[next] {
                    Color::Gray => {
                        let start = path.iter().position(|&p| p == next).unwrap_or(0);
                        let mut cursors: Vec<String> =
                            path[start..].iter().map(|&p| dests[p].to_string()).collect();
                        cursors.push(dests[next].to_string());
                        return Err(Error::Cycle { cursors });
                    }
                    Color::White => visit(next, deps, colors, path, dests)?,
                    Color::Black => {}
                }
            }

            path.pop();
            colors[node] = Color::Black;
            Ok(())
        }

        for node in 0..n {
            if colors[node] == Color::White {
                visit(node, &self.deps, &mut colors, &mut path, dests)?;
            }
        }
        Ok(())
    }

    /// Topological order; document order breaks ties between
    /// independent calls.
    pub fn topo_order(&self) -> Vec<usize> {
        let n = self.deps.len();
        let mut indegree: Vec<usize> = self.deps.iter().map(|d| d.len()).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
            .filter(|&i| indegree[i] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for &dependent in &self.dependents[node] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }
        order
    }

    /// Partition into waves: the first wave has no unresolved
    /// dependencies, and each later wave depends only on earlier ones.
    /// Call order within a wave is document order.
    pub fn waves(&self) -> Vec<Vec<usize>> {
        let n = self.deps.len();
        let mut indegree: Vec<usize> = self.deps.iter().map(|d| d.len()).collect();
        let mut assigned = vec![false; n];
        let mut waves = Vec::new();

        loop {
            let mut wave: Vec<usize> = (0..n)
                .filter(|&i| !assigned[i] && indegree[i] == 0)
                .collect();
            if wave.is_empty() {
                break;
            }
            wave.sort_unstable();

            for &node in &wave {
                assigned[node] = true;
            }
            for &node in &wave {
                for &dependent in &self.dependents[node] {
                    indegree[dependent] = indegree[dependent].saturating_sub(1);
                }
            }
            waves.push(wave);
        }

        waves
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursors(paths: &[&str]) -> Vec<Cursor> {
        paths.iter().map(|p| Cursor::parse(p).unwrap()).collect()
    }

    #[test]
    fn test_linear_chain_orders() {
        // c depends on b depends on a.
        let dests = cursors(&["a", "b", "c"]);
        let deps = vec![vec![], cursors(&["a"]), cursors(&["b"])];
        let graph = DepGraph::build(&dests, &deps);

        graph.check_cycles(&dests).unwrap();
        assert_eq!(graph.topo_order(), vec![0, 1, 2]);
        assert_eq!(graph.waves(), vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn test_independent_calls_keep_document_order() {
        let dests = cursors(&["x", "y", "z"]);
        let deps = vec![vec![], vec![], vec![]];
        let graph = DepGraph::build(&dests, &deps);

        assert_eq!(graph.topo_order(), vec![0, 1, 2]);
        assert_eq!(graph.waves(), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_dependency_on_subtree_orders() {
        // The call at `out` depends on `m`, which contains the call at
        // `m.inner`.
        let dests = cursors(&["out", "m.inner"]);
        let deps = vec![cursors(&["m"]), vec![]];
        let graph = DepGraph::build(&dests, &deps);

        assert_eq!(graph.topo_order(), vec![1, 0]);
    }

    #[test]
    fn test_two_cycle_reported_with_cursors() {
        let dests = cursors(&["a", "b"]);
        let deps = vec![cursors(&["b"]), cursors(&["a"])];
        let graph = DepGraph::build(&dests, &deps);

        let err = graph.check_cycles(&dests).unwrap_err();
        match err {
            Error::Cycle { cursors } => {
                assert!(cursors.contains(&"a".to_string()));
                assert!(cursors.contains(&"b".to_string()));
            }
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn test_self_cycle_detected() {
        let dests = cursors(&["a"]);
        let deps = vec![cursors(&["a"])];
        let graph = DepGraph::build(&dests, &deps);
        assert!(graph.check_cycles(&dests).is_err());
    }

    #[test]
    fn test_diamond_waves() {
        // b and c both depend on a; d depends on b and c.
        let dests = cursors(&["a", "b", "c", "d"]);
        let deps = vec![
            vec![],
            cursors(&["a"]),
            cursors(&["a"]),
            cursors(&["b", "c"]),
        ];
        let graph = DepGraph::build(&dests, &deps);

        assert_eq!(graph.waves(), vec![vec![0], vec![1, 2], vec![3]]);
        assert_eq!(graph.topo_order(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_longer_cycle_lists_every_cursor() {
        let dests = cursors(&["a", "b", "c"]);
        let deps = vec![cursors(&["c"]), cursors(&["a"]), cursors(&["b"])];
        let graph = DepGraph::build(&dests, &deps);

        let err = graph.check_cycles(&dests).unwrap_err();
        match err {
            Error::Cycle { cursors } => {
                for name in ["a", "b", "c"] {
                    assert!(cursors.contains(&name.to_string()), "missing {}", name);
                }
            }
            other => panic!("expected cycle error, got {:?}", other),
        }
    }
}
