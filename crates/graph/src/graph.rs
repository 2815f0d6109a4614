use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use refactor_catalog::{ObjectKind, RoutineRef};
use serde::Serialize;
use std::collections::HashMap;

/// Object seen during a traversal
#[derive(Debug, Clone, Serialize)]
pub struct GraphObject {
    pub target: RoutineRef,
    pub kind: ObjectKind,
}

/// Every reference a traversal walked, including the ones that hit an
/// already visited object (so cycles stay visible).
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<GraphObject, ()>,
    index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add object if missing; an `Unknown` kind is upgraded once the object is classified
    pub fn add_node(&mut self, target: &RoutineRef, kind: ObjectKind) -> NodeIndex {
        let key = target.canonical_key();
        if let Some(&idx) = self.index.get(&key) {
            if let Some(node) = self.graph.node_weight_mut(idx) {
                if node.kind == ObjectKind::Unknown {
                    node.kind = kind;
                }
            }
            return idx;
        }

        let idx = self.graph.add_node(GraphObject {
            target: target.clone(),
            kind,
        });
        self.index.insert(key, idx);
        idx
    }

    /// Record that `from` references `to`; repeated references collapse
    pub fn add_edge(
        &mut self,
        from: &RoutineRef,
        from_kind: ObjectKind,
        to: &RoutineRef,
        to_kind: ObjectKind,
    ) {
        let a = self.add_node(from, from_kind);
        let b = self.add_node(to, to_kind);
        self.graph.update_edge(a, b, ());
    }

    pub fn find_node(&self, target: &RoutineRef) -> Option<NodeIndex> {
        self.index.get(&target.canonical_key()).copied()
    }

    pub fn get_node(&self, idx: NodeIndex) -> Option<&GraphObject> {
        self.graph.node_weight(idx)
    }

    /// Objects `target` references directly
    pub fn dependencies_of(&self, target: &RoutineRef) -> Vec<&GraphObject> {
        let Some(idx) = self.find_node(target) else {
            return Vec::new();
        };
        self.graph
            .edges(idx)
            .filter_map(|e| self.graph.node_weight(e.target()))
            .collect()
    }

    /// `(from, to)` pairs in insertion order
    pub fn edges(&self) -> Vec<(&GraphObject, &GraphObject)> {
        self.graph
            .edge_references()
            .filter_map(|e| {
                Some((
                    self.graph.node_weight(e.source())?,
                    self.graph.node_weight(e.target())?,
                ))
            })
            .collect()
    }

    /// Groups of objects that reference each other, directly or transitively.
    /// A routine calling itself is a cycle of one.
    pub fn cycles(&self) -> Vec<Vec<RoutineRef>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || self.graph.find_edge(scc[0], scc[0]).is_some()
            })
            .map(|scc| {
                let mut members: Vec<RoutineRef> = scc
                    .into_iter()
                    .filter_map(|idx| self.graph.node_weight(idx))
                    .map(|n| n.target.clone())
                    .collect();
                members.sort_by_key(|r| r.canonical_key());
                members
            })
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
