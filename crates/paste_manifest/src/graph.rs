//! Deterministic dependency ordering over the modules of one content type.
//!
//! Ordering is a layered topological sort: every round extracts all nodes
//! whose remaining dependencies are satisfied, emits them alphabetically as
//! one layer, and subtracts them from everyone else. Nodes left over when no
//! round makes progress sit on (or behind) a cycle; they are reported and
//! dropped rather than failing the whole resolution.

use std::collections::{BTreeMap, BTreeSet};

use tracing::error;

/// Direct dependency edges between module names.
///
/// Names that are only ever referenced as dependencies become implicit leaf
/// nodes with no dependencies of their own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    direct: BTreeMap<String, BTreeSet<String>>,
}

/// The result of ordering a [`DependencyGraph`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopoOrder {
    /// Extracted layers, in extraction order, each sorted alphabetically.
    pub layers: Vec<Vec<String>>,
    /// Nodes that could not be ordered, with their unsatisfied dependencies.
    pub cyclic: BTreeMap<String, BTreeSet<String>>,
}

impl TopoOrder {
    /// The layers concatenated into the final build order.
    pub fn flat(&self) -> Vec<String> {
        self.layers.iter().flatten().cloned().collect()
    }

    /// Returns `true` if every node was ordered.
    pub fn is_complete(&self) -> bool {
        self.cyclic.is_empty()
    }
}

impl DependencyGraph {
    /// Builds a graph from `(name, direct dependencies)` pairs.
    ///
    /// Self-references are dropped and undeclared dependency names are added
    /// as leaves. The input order has no effect on anything derived from the graph.
    pub fn new<I, D>(nodes: I) -> Self
    where
        I: IntoIterator<Item = (String, D)>,
        D: IntoIterator<Item = String>,
    {
        let mut direct: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (name, deps) in nodes {
            let deps: BTreeSet<String> = deps.into_iter().filter(|dep| *dep != name).collect();
            direct.entry(name).or_default().extend(deps);
        }

        let implicit: BTreeSet<String> = direct
            .values()
            .flatten()
            .filter(|dep| !direct.contains_key(*dep))
            .cloned()
            .collect();
        for leaf in implicit {
            direct.insert(leaf, BTreeSet::new());
        }

        Self { direct }
    }

    /// Number of nodes, implicit leaves included.
    pub fn len(&self) -> usize {
        self.direct.len()
    }

    /// Returns `true` if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.direct.is_empty()
    }

    /// Direct dependencies of a node.
    pub fn direct(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.direct.get(name)
    }

    /// Orders the graph into layers.
    ///
    /// Terminates on any input. Cyclic nodes, and every node that depends on
    /// one, end up in [`TopoOrder::cyclic`] and are logged.
    pub fn topological_order(&self) -> TopoOrder {
        let mut remaining = self.direct.clone();
        let mut layers = Vec::new();

        loop {
            // BTreeMap iteration makes each layer alphabetical.
            let layer: Vec<String> = remaining
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(name, _)| name.clone())
                .collect();
            if layer.is_empty() {
                break;
            }

            for name in &layer {
                remaining.remove(name);
            }
            for deps in remaining.values_mut() {
                for name in &layer {
                    deps.remove(name);
                }
            }
            layers.push(layer);
        }

        if !remaining.is_empty() {
            error!(
                nodes = ?remaining.keys().collect::<Vec<_>>(),
                "circular dependency, dropping nodes from build order"
            );
        }

        TopoOrder {
            layers,
            cyclic: remaining,
        }
    }

    /// Every name reachable from `name` through direct edges, excluding `name` itself.
    ///
    /// Iterative with a visited set, so residual cycles cannot cause unbounded work.
    pub fn transitive_dependencies(&self, name: &str) -> BTreeSet<String> {
        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut stack: Vec<&str> = match self.direct.get(name) {
            Some(deps) => deps.iter().map(String::as_str).collect(),
            None => return visited,
        };

        while let Some(current) = stack.pop() {
            if current == name || visited.contains(current) {
                continue;
            }
            visited.insert(current.to_string());
            if let Some(deps) = self.direct.get(current) {
                stack.extend(deps.iter().map(String::as_str));
            }
        }
        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Builds a graph from `(name, "space separated deps")` pairs.
    fn graph(edges: &[(&str, &str)]) -> DependencyGraph {
        DependencyGraph::new(edges.iter().map(|(name, deps)| {
            (
                name.to_string(),
                deps.split_whitespace().map(str::to_string).collect::<Vec<_>>(),
            )
        }))
    }

    fn set(names: &str) -> BTreeSet<String> {
        names.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn linear_chain_orders_leaves_first() {
        let g = graph(&[("A", "B"), ("B", "C"), ("C", "")]);
        let order = g.topological_order();
        assert_eq!(order.flat(), vec!["C", "B", "A"]);
        assert!(order.is_complete());
        assert_eq!(g.transitive_dependencies("A"), set("B C"));
        assert_eq!(g.transitive_dependencies("B"), set("C"));
        assert!(g.transitive_dependencies("C").is_empty());
    }

    #[test]
    fn layers_are_alphabetical() {
        let g = graph(&[
            ("zeta", "core"),
            ("alpha", "core"),
            ("mid", ""),
            ("core", ""),
        ]);
        let order = g.topological_order();
        assert_eq!(
            order.layers,
            vec![vec!["core", "mid"], vec!["alpha", "zeta"]]
        );
    }

    #[test]
    fn self_reference_is_ignored() {
        let g = graph(&[("A", "A B"), ("B", "")]);
        assert_eq!(g.direct("A"), Some(&set("B")));
        assert_eq!(g.topological_order().flat(), vec!["B", "A"]);
    }

    #[test]
    fn undeclared_dependency_is_implicit_leaf() {
        let g = graph(&[("app", "vendor.jquery")]);
        assert_eq!(g.len(), 2);
        assert_eq!(g.direct("vendor.jquery"), Some(&BTreeSet::new()));
        assert_eq!(g.topological_order().flat(), vec!["vendor.jquery", "app"]);
    }

    #[test]
    fn two_node_cycle_is_dropped() {
        let g = graph(&[("A", "B"), ("B", "A")]);
        let order = g.topological_order();
        assert!(order.flat().is_empty());
        assert_eq!(order.cyclic.keys().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn cycle_keeps_unrelated_nodes() {
        let g = graph(&[
            ("A", "B"),
            ("B", "A"),
            ("C", "A"),
            ("D", ""),
            ("E", "D"),
        ]);
        let order = g.topological_order();
        assert_eq!(order.flat(), vec!["D", "E"]);
        assert_eq!(order.cyclic.len(), 3);
    }

    #[test]
    fn closure_walk_survives_cycles() {
        let g = graph(&[("A", "B"), ("B", "C"), ("C", "A")]);
        assert_eq!(g.transitive_dependencies("A"), set("B C"));
        assert_eq!(g.transitive_dependencies("C"), set("A B"));
    }

    #[test]
    fn diamond_closure() {
        let g = graph(&[
            ("app", "left right"),
            ("left", "base"),
            ("right", "base"),
            ("base", ""),
        ]);
        assert_eq!(g.topological_order().flat(), vec!["base", "left", "right", "app"]);
        assert_eq!(
            g.transitive_dependencies("app"),
            set("base left right")
        );
    }

    #[test]
    fn empty_graph() {
        let g = DependencyGraph::default();
        assert!(g.is_empty());
        let order = g.topological_order();
        assert!(order.flat().is_empty());
        assert!(order.is_complete());
    }

    fn arb_edges() -> impl Strategy<Value = Vec<(String, Vec<String>)>> {
        let name = prop::sample::select(vec!["a", "b", "c", "d", "e", "f", "g", "h"])
            .prop_map(str::to_string);
        prop::collection::vec(
            (name.clone(), prop::collection::vec(name, 0..4)),
            0..10,
        )
    }

    proptest! {
        #[test]
        fn input_order_does_not_change_output(edges in arb_edges()) {
            let mut reversed = edges.clone();
            reversed.reverse();
            let forward = DependencyGraph::new(edges);
            let backward = DependencyGraph::new(reversed);
            prop_assert_eq!(forward.topological_order(), backward.topological_order());
        }

        #[test]
        fn order_respects_dependencies(edges in arb_edges()) {
            let g = DependencyGraph::new(edges);
            let flat = g.topological_order().flat();
            for (position, name) in flat.iter().enumerate() {
                for dep in g.direct(name).unwrap() {
                    let dep_position = flat.iter().position(|n| n == dep);
                    prop_assert!(dep_position.is_some_and(|p| p < position));
                }
            }
        }

        #[test]
        fn closure_is_transitive(edges in arb_edges()) {
            let g = DependencyGraph::new(edges);
            for name in g.topological_order().flat() {
                let closure = g.transitive_dependencies(&name);
                prop_assert!(!closure.contains(&name));
                for dep in &closure {
                    let inner = g.transitive_dependencies(dep);
                    prop_assert!(inner.iter().all(|n| n == &name || closure.contains(n)));
                }
            }
        }
    }
}
