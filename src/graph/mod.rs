//! # Dual graph
//!
//! The two views one run produces, plus the registry between them:
//!
//! | Type | Nodes | Edges |
//! |------|-------|-------|
//! | `LogicalGraph` | `LogicalNode` | `CONTAINS`, parent → child |
//! | `GeometryRegistry` | `GeometryNode` (with mesh) | |
//! | `GeometryGraph` | `GeometryVertex` (no mesh) | `CONNECTED_TO`, unordered |
//!
//! Every edge is stored against application ids, never object references.

pub mod builder;
pub mod assemble;

use std::collections::BTreeSet;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::model::{ApplicationId, ConnectedPair, ContainsEdge, GeometryNode, LogicalNode};

pub use builder::{BuildOutput, GraphBuilder};
pub use assemble::assemble;

// ============================================================================
// LogicalGraph
// ============================================================================

/// Containment view. Direct parent → child links only, never the closure.
#[derive(Debug, Clone, Default)]
pub struct LogicalGraph {
    nodes: Vec<LogicalNode>,
    index: HashMap<ApplicationId, usize>,
    edges: Vec<ContainsEdge>,
    edge_set: HashSet<ContainsEdge>,
    dangling: Vec<ContainsEdge>,
}

impl LogicalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node; false when the id is already present.
    pub fn add_node(&mut self, node: LogicalNode) -> bool {
        if self.index.contains_key(&node.id) {
            return false;
        }
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        true
    }

    /// Insert a CONTAINS edge; false when it already exists.
    pub fn add_edge(&mut self, edge: ContainsEdge) -> bool {
        if !self.edge_set.insert(edge.clone()) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    pub fn node(&self, id: &str) -> Option<&LogicalNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn nodes(&self) -> &[LogicalNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[ContainsEdge] {
        &self.edges
    }

    pub fn contains_edge(&self, parent: &str, child: &str) -> bool {
        self.edge_set.contains(&ContainsEdge::new(parent, child))
    }

    pub fn children_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a ApplicationId> + 'a {
        self.edges.iter().filter(move |e| e.parent.as_str() == id).map(|e| &e.child)
    }

    pub fn parents_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a ApplicationId> + 'a {
        self.edges.iter().filter(move |e| e.child.as_str() == id).map(|e| &e.parent)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges removed because their target was never emitted.
    pub fn dangling(&self) -> &[ContainsEdge] {
        &self.dangling
    }

    /// Move every edge whose child fails `resolves` into the dangling list.
    /// Returns how many were moved.
    pub fn drop_dangling(&mut self, resolves: impl Fn(&ApplicationId) -> bool) -> usize {
        let (kept, dropped): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.edges).into_iter().partition(|e| resolves(&e.child));
        for edge in &dropped {
            tracing::warn!(parent = %edge.parent, child = %edge.child, "dropping dangling CONTAINS edge");
            self.edge_set.remove(edge);
        }
        self.edges = kept;
        let n = dropped.len();
        self.dangling.extend(dropped);
        n
    }
}

// ============================================================================
// GeometryRegistry
// ============================================================================

/// id → geometry node, populated once per run. Owns the meshes.
#[derive(Debug, Clone, Default)]
pub struct GeometryRegistry {
    nodes: Vec<GeometryNode>,
    index: HashMap<ApplicationId, usize>,
}

impl GeometryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node; false when the id is already registered.
    pub fn register(&mut self, node: GeometryNode) -> bool {
        if self.index.contains_key(&node.id) {
            return false;
        }
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        true
    }

    pub fn get(&self, id: &str) -> Option<&GeometryNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GeometryNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl FromIterator<GeometryNode> for GeometryRegistry {
    fn from_iter<I: IntoIterator<Item = GeometryNode>>(iter: I) -> Self {
        let mut registry = Self::new();
        for node in iter {
            registry.register(node);
        }
        registry
    }
}

impl<'a> IntoIterator for &'a GeometryRegistry {
    type Item = &'a GeometryNode;
    type IntoIter = std::slice::Iter<'a, GeometryNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

// ============================================================================
// GeometryGraph
// ============================================================================

/// Geometry graph node: what the sink persists, without the mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryVertex {
    pub id: ApplicationId,
    pub name: String,
    pub type_name: String,
}

/// Spatial adjacency view.
#[derive(Debug, Clone, Default)]
pub struct GeometryGraph {
    nodes: Vec<GeometryVertex>,
    index: HashMap<ApplicationId, usize>,
    edges: BTreeSet<ConnectedPair>,
}

impl GeometryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, vertex: GeometryVertex) -> bool {
        if self.index.contains_key(&vertex.id) {
            return false;
        }
        self.index.insert(vertex.id.clone(), self.nodes.len());
        self.nodes.push(vertex);
        true
    }

    /// Insert an edge between two known nodes.
    pub fn add_edge(&mut self, pair: ConnectedPair) -> bool {
        if !self.contains_node(pair.low().as_str()) || !self.contains_node(pair.high().as_str()) {
            return false;
        }
        self.edges.insert(pair)
    }

    pub fn node(&self, id: &str) -> Option<&GeometryVertex> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn nodes(&self) -> &[GeometryVertex] {
        &self.nodes
    }

    pub fn edges(&self) -> &BTreeSet<ConnectedPair> {
        &self.edges
    }

    pub fn contains_edge(&self, a: &str, b: &str) -> bool {
        ConnectedPair::new(a, b).is_some_and(|p| self.edges.contains(&p))
    }

    pub fn neighbours<'a>(&'a self, id: &'a ApplicationId) -> impl Iterator<Item = &'a ApplicationId> + 'a {
        self.edges.iter().filter_map(move |p| p.other(id))
    }

    pub fn degree(&self, id: &ApplicationId) -> usize {
        self.neighbours(id).count()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChildIds, PropertyMap};

    fn logical(id: &str, children: &[&str]) -> LogicalNode {
        LogicalNode {
            id: id.into(),
            name: id.into(),
            type_name: "Level".into(),
            children: children.iter().map(|c| ApplicationId::from(*c)).collect::<ChildIds>(),
            properties: PropertyMap::new(),
        }
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let mut g = LogicalGraph::new();
        assert!(g.add_edge(ContainsEdge::new("a", "b")));
        assert!(!g.add_edge(ContainsEdge::new("a", "b")));
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_drop_dangling() {
        let mut g = LogicalGraph::new();
        g.add_node(logical("a", &["b", "gone"]));
        g.add_node(logical("b", &[]));
        g.add_edge(ContainsEdge::new("a", "b"));
        g.add_edge(ContainsEdge::new("a", "gone"));

        let dropped = g.drop_dangling(|id| g_contains(id));
        assert_eq!(dropped, 1);
        assert!(g.contains_edge("a", "b"));
        assert!(!g.contains_edge("a", "gone"));
        assert_eq!(g.dangling(), &[ContainsEdge::new("a", "gone")]);
        assert_eq!(g.children_of("a").count(), 1);
        assert_eq!(g.parents_of("b").count(), 1);
    }

    fn g_contains(id: &ApplicationId) -> bool {
        id.as_str() != "gone"
    }

    #[test]
    fn test_geometry_edge_needs_both_nodes() {
        let mut g = GeometryGraph::new();
        g.add_node(GeometryVertex { id: "a".into(), name: "a".into(), type_name: "Mesh".into() });
        g.add_node(GeometryVertex { id: "b".into(), name: "b".into(), type_name: "Mesh".into() });

        assert!(g.add_edge(ConnectedPair::new("b", "a").unwrap()));
        assert!(!g.add_edge(ConnectedPair::new("a", "zzz").unwrap()));
        assert!(g.contains_edge("a", "b"));
        assert!(g.contains_edge("b", "a"));
        assert_eq!(g.degree(&"a".into()), 1);
    }
}
