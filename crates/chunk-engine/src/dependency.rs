//! File-local dependency graph over segments.
//!
//! Edges point from the segment that depends to the segment it depends on.
//! Cycles (mutual recursion) are legal; every traversal is visited-set guarded.

use crate::context::ContextBundle;
use crate::segment::{Segment, SegmentId, SegmentKind};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Relationship carried by an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// A calls B
    Calls,

    /// A is owned by or extends B
    Inherits,

    /// A mentions a name B defines
    References,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: SegmentId,
    pub to: SegmentId,
    pub kind: EdgeKind,
}

/// Directed graph whose node `i` is segment `i`
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<SegmentId, EdgeKind>,
    edges: Vec<DependencyEdge>,
    cyclic: BTreeSet<SegmentId>,
}

impl DependencyGraph {
    fn from_edges(segment_count: usize, edges: Vec<DependencyEdge>) -> Self {
        let mut graph = DiGraph::with_capacity(segment_count, edges.len());
        for id in 0..segment_count {
            graph.add_node(id);
        }
        for edge in &edges {
            graph.add_edge(NodeIndex::new(edge.from), NodeIndex::new(edge.to), edge.kind);
        }

        let mut result = Self {
            graph,
            edges,
            cyclic: BTreeSet::new(),
        };
        result.cyclic = result.cycles().into_iter().flatten().collect();
        result
    }

    /// All edges, sorted and without duplicates
    #[must_use]
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Segments `id` depends on directly
    #[must_use]
    pub fn dependencies_of(&self, id: SegmentId) -> Vec<SegmentId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Segments that depend on `id` directly
    #[must_use]
    pub fn dependents_of(&self, id: SegmentId) -> Vec<SegmentId> {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(&self, id: SegmentId, direction: Direction) -> Vec<SegmentId> {
        if id >= self.graph.node_count() {
            return Vec::new();
        }
        let ids: BTreeSet<SegmentId> = self
            .graph
            .edges_directed(NodeIndex::new(id), direction)
            .map(|e| match direction {
                Direction::Outgoing => e.target().index(),
                Direction::Incoming => e.source().index(),
            })
            .collect();
        ids.into_iter().collect()
    }

    /// Everything reachable from `id`, excluding `id` itself unless it sits on a cycle
    #[must_use]
    pub fn transitive_dependencies(&self, id: SegmentId) -> BTreeSet<SegmentId> {
        let mut visited = BTreeSet::new();
        let mut result = BTreeSet::new();
        let mut stack = self.dependencies_of(id);

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            result.insert(current);
            for next in self.dependencies_of(current) {
                if !visited.contains(&next) {
                    stack.push(next);
                }
            }
        }
        result
    }

    /// Strongly connected groups of mutually dependent segments
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<SegmentId>> {
        let mut cycles: Vec<Vec<SegmentId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&n| self.graph.contains_edge(n, n))
            })
            .map(|component| {
                let mut ids: Vec<SegmentId> = component.into_iter().map(NodeIndex::index).collect();
                ids.sort_unstable();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }

    #[must_use]
    pub fn in_cycle(&self, id: SegmentId) -> bool {
        self.cyclic.contains(&id)
    }

    /// Segments on a cycle cannot be understood in isolation from their partners
    #[must_use]
    pub fn can_isolate(&self, id: SegmentId) -> bool {
        !self.in_cycle(id)
    }
}

/// Builds the dependency graph in a single pass over the bundles
pub struct DependencyAnalyzer;

impl DependencyAnalyzer {
    pub fn analyze(segments: &[Segment], bundles: &[ContextBundle]) -> DependencyGraph {
        let mut edges: Vec<DependencyEdge> = Vec::new();

        for segment in segments {
            if let Some(parent) = segment.parent_id {
                edges.push(DependencyEdge {
                    from: segment.id,
                    to: parent,
                    kind: EdgeKind::Inherits,
                });
            }
        }

        for bundle in bundles {
            for (name, &target) in &bundle.referenced_symbols {
                if target == bundle.segment || target >= segments.len() {
                    continue;
                }
                let is_base = bundle.base_names.iter().any(|base| base == name)
                    && segments[target].kind == SegmentKind::Class;
                let kind = if is_base {
                    EdgeKind::Inherits
                } else if bundle.called_symbols.contains(name) {
                    EdgeKind::Calls
                } else {
                    EdgeKind::References
                };
                edges.push(DependencyEdge {
                    from: bundle.segment,
                    to: target,
                    kind,
                });
            }
        }

        edges.sort();
        edges.dedup();

        let graph = DependencyGraph::from_edges(segments.len(), edges);
        log::debug!(
            "dependency graph: {} segments, {} edges, {} cycle(s)",
            graph.segment_count(),
            graph.edges().len(),
            graph.cycles().len()
        );
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn seg(id: SegmentId, kind: SegmentKind, parent_id: Option<SegmentId>) -> Segment {
        Segment {
            id,
            kind,
            byte_range: id * 10..id * 10 + 10,
            name: Some(format!("s{id}")),
            declared_tokens: 5,
            parent_id,
        }
    }

    fn bundle(segment: SegmentId, refs: &[(&str, SegmentId)], calls: &[&str]) -> ContextBundle {
        ContextBundle {
            segment,
            referenced_symbols: refs
                .iter()
                .map(|(name, id)| (name.to_string(), *id))
                .collect::<BTreeMap<_, _>>(),
            called_symbols: calls.iter().map(|c| c.to_string()).collect(),
            ..ContextBundle::default()
        }
    }

    #[test]
    fn mutual_recursion_is_a_cycle() {
        let segments = vec![
            seg(0, SegmentKind::Function, None),
            seg(1, SegmentKind::Function, None),
            seg(2, SegmentKind::Function, None),
        ];
        let bundles = vec![
            bundle(0, &[("s1", 1)], &["s1"]),
            bundle(1, &[("s0", 0)], &["s0"]),
            bundle(2, &[("s0", 0)], &[]),
        ];
        let graph = DependencyAnalyzer::analyze(&segments, &bundles);

        assert_eq!(graph.cycles(), vec![vec![0, 1]]);
        assert!(graph.in_cycle(0));
        assert!(!graph.in_cycle(2));
        assert!(graph.can_isolate(2));
        assert_eq!(graph.transitive_dependencies(2), BTreeSet::from([0, 1]));
        assert_eq!(graph.transitive_dependencies(0), BTreeSet::from([0, 1]));
        assert_eq!(graph.dependents_of(0), vec![1, 2]);
        assert_eq!(
            graph.edges()[0],
            DependencyEdge {
                from: 0,
                to: 1,
                kind: EdgeKind::Calls
            }
        );
        assert_eq!(graph.edges().len(), 3);
        assert_eq!(graph.edges()[2].kind, EdgeKind::References);
    }

    #[test]
    fn class_membership_and_bases_are_inherits_edges() {
        let segments = vec![
            seg(0, SegmentKind::Class, None),
            seg(1, SegmentKind::Class, None),
            seg(2, SegmentKind::Method, Some(1)),
        ];
        let mut derived = bundle(1, &[("s0", 0)], &[]);
        derived.base_names = vec!["s0".to_string()];
        let bundles = vec![bundle(0, &[], &[]), derived, bundle(2, &[], &[])];

        let graph = DependencyAnalyzer::analyze(&segments, &bundles);
        assert_eq!(
            graph.edges(),
            &[
                DependencyEdge {
                    from: 1,
                    to: 0,
                    kind: EdgeKind::Inherits
                },
                DependencyEdge {
                    from: 2,
                    to: 1,
                    kind: EdgeKind::Inherits
                },
            ]
        );
        assert_eq!(graph.dependencies_of(2), vec![1]);
        assert!(graph.cycles().is_empty());
    }

    #[test]
    fn out_of_range_queries_are_empty() {
        let graph = DependencyAnalyzer::analyze(&[], &[]);
        assert!(graph.dependencies_of(7).is_empty());
        assert!(graph.transitive_dependencies(7).is_empty());
        assert!(!graph.in_cycle(7));
    }
}
