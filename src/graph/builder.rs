//! Consumes the typed-node stream and fills the two containers.

use crate::failure::FailureReport;
use crate::model::{ContainsEdge, TypedNode};
use crate::source::ObjectSource;
use crate::traverse::{ParallelTraversal, Traversal, TraversalStats};
use crate::Result;
use super::{GeometryRegistry, LogicalGraph};

/// Everything one build pass produces.
#[derive(Debug, Default)]
pub struct BuildOutput {
    pub logical: LogicalGraph,
    pub registry: GeometryRegistry,
    pub failures: FailureReport,
    pub stats: TraversalStats,
}

/// Routes logical nodes into the [`LogicalGraph`] and geometry nodes into the
/// [`GeometryRegistry`], in a single pass.
///
/// CONTAINS edges are added from each logical node's own child list, so an
/// edge may point at a child that is emitted later (or never). Dangling
/// edges are resolved in [`GraphBuilder::finish`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    logical: LogicalGraph,
    registry: GeometryRegistry,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain a sequential traversal.
    ///
    /// An adapter error or cancellation aborts the build; per-object failures
    /// are carried over from the traversal into the output.
    pub fn build<S: ObjectSource>(mut traversal: Traversal<S>) -> Result<BuildOutput> {
        let mut builder = Self::new();
        for node in traversal.by_ref() {
            builder.push(node?);
        }
        let (failures, stats) = traversal.into_parts();
        Ok(builder.finish(failures, stats))
    }

    /// Same as [`GraphBuilder::build`] for an already materialized parallel walk.
    pub fn from_parallel(walk: ParallelTraversal) -> BuildOutput {
        let ParallelTraversal { nodes, failures, stats } = walk;
        Self::consume(nodes, failures, stats)
    }

    /// Build from any stream of typed nodes.
    pub fn consume<I>(nodes: I, failures: FailureReport, stats: TraversalStats) -> BuildOutput
    where
        I: IntoIterator<Item = TypedNode>,
    {
        let mut builder = Self::new();
        for node in nodes {
            builder.push(node);
        }
        builder.finish(failures, stats)
    }

    /// Route one node. A repeated id is ignored.
    pub fn push(&mut self, node: TypedNode) {
        match node {
            TypedNode::Logical(node) => {
                let id = node.id.clone();
                let edges: Vec<ContainsEdge> = node
                    .children
                    .iter()
                    .map(|child| ContainsEdge::new(&id, child))
                    .collect();
                if !self.logical.add_node(node) {
                    tracing::warn!(id = %id, "duplicate logical node ignored");
                    return;
                }
                for edge in edges {
                    self.logical.add_edge(edge);
                }
            }
            TypedNode::Geometry(node) => {
                let id = node.id.clone();
                if !self.registry.register(node) {
                    tracing::warn!(id = %id, "duplicate geometry node ignored");
                }
            }
        }
    }

    /// Drop dangling CONTAINS edges and hand back the containers.
    ///
    /// An edge survives when its child is a logical node or a registered
    /// geometry node; everything else (skipped, failed, missing) is moved to
    /// [`LogicalGraph::dangling`].
    pub fn finish(mut self, failures: FailureReport, stats: TraversalStats) -> BuildOutput {
        let registry = &self.registry;
        let known: hashbrown::HashSet<_> = self
            .logical
            .nodes()
            .iter()
            .map(|n| n.id.clone())
            .chain(registry.iter().map(|g| g.id.clone()))
            .collect();
        let dropped = self.logical.drop_dangling(|id| known.contains(id));

        tracing::info!(
            logical = self.logical.node_count(),
            contains = self.logical.edge_count(),
            geometry = self.registry.len(),
            dangling = dropped,
            "dual graph built"
        );

        BuildOutput {
            logical: self.logical,
            registry: self.registry,
            failures,
            stats,
        }
    }
}
