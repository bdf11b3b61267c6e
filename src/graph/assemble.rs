use std::collections::BTreeSet;

use crate::model::ConnectedPair;
use super::{GeometryGraph, GeometryRegistry, GeometryVertex};

/// Build the geometry graph: one node per registered geometry (degenerate
/// ones included, they just end up with no edges) and one edge per pair.
///
/// Pairs naming an unregistered id are dropped with a warning.
pub fn assemble(registry: &GeometryRegistry, pairs: &BTreeSet<ConnectedPair>) -> GeometryGraph {
    let mut graph = GeometryGraph::new();
    for node in registry {
        graph.add_node(GeometryVertex {
            id: node.id.clone(),
            name: node.name.clone(),
            type_name: node.type_name.clone(),
        });
    }

    for pair in pairs {
        if !graph.add_edge(pair.clone()) {
            tracing::warn!(low = %pair.low(), high = %pair.high(), "pair references unknown geometry");
        }
    }

    tracing::info!(
        nodes = graph.node_count(),
        connected = graph.edge_count(),
        "geometry graph assembled"
    );
    graph
}
