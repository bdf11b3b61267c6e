//! End-to-end tests for the DAG traverser and the dual graph builder.
//!
//! Each test loads a small hierarchy (JSON or in-memory), walks it, and
//! checks what was emitted, what was recorded as a failure, and which
//! CONTAINS edges survived.

use dualgraph::source::load_json_str;
use dualgraph::{
    traverse, traverse_parallel, FailureKind, GraphBuilder, MemorySource, Mesh, RawMesh, RawObject, TypedNode,
};
use glam::DVec3;
use pretty_assertions::assert_eq;

fn cube_at(x: f64) -> RawMesh {
    RawMesh::from_mesh(&Mesh::unit_cube(DVec3::new(x, 0.0, 0.0)))
}

fn ids(nodes: &[TypedNode]) -> Vec<String> {
    let mut ids: Vec<String> = nodes.iter().map(|n| n.id().to_string()).collect();
    ids.sort();
    ids
}

// ============================================================================
// 1. Dedup: a node shared by several parents is emitted once
// ============================================================================

#[tokio::test]
async fn test_shared_descendant_emitted_once() {
    let source: MemorySource = [
        RawObject::new("site", "Collection").with_children(["l1", "l2", "l3"]),
        RawObject::new("l1", "Level").with_children(["shared"]),
        RawObject::new("l2", "Level").with_children(["shared"]),
        RawObject::new("l3", "Level").with_children(["shared", "shared"]),
        RawObject::new("shared", "Wall").with_mesh(cube_at(0.0)),
    ]
    .into_iter()
    .collect();

    let nodes: Vec<TypedNode> = traverse(&source, "site", Vec::<String>::new())
        .collect::<dualgraph::Result<_>>()
        .unwrap();
    assert_eq!(ids(&nodes), vec!["l1", "l2", "l3", "shared", "site"]);

    let out = GraphBuilder::build(traverse(&source, "site", Vec::<String>::new())).unwrap();
    assert_eq!(out.registry.len(), 1);
    // One edge per direct parent, the repeated child id collapses.
    assert_eq!(out.logical.parents_of("shared").count(), 3);
    assert_eq!(out.logical.edge_count(), 6);
}

// ============================================================================
// 2. Null safety: absent / null child lists and meshes
// ============================================================================

#[tokio::test]
async fn test_null_children_and_mesh() {
    let doc = load_json_str(
        r#"{"root": "site", "objects": [
            {"applicationId": "site", "speckle_type": "Collection",
             "containedElementsIds": ["a", "b", "c"]},
            {"applicationId": "a", "speckle_type": "Level", "containedElementsIds": null},
            {"applicationId": "b", "speckle_type": "Level", "containedElementsIds": []},
            {"applicationId": "c", "speckle_type": "Parameter", "displayValue": null}
        ]}"#,
    )
    .unwrap();

    let mut walk = traverse(&doc.source, doc.root.clone().unwrap(), Vec::<String>::new());
    let nodes: Vec<TypedNode> = walk.by_ref().collect::<dualgraph::Result<_>>().unwrap();

    assert_eq!(nodes.len(), 4);
    assert!(nodes.iter().all(|n| !n.is_geometry()));
    for node in &nodes[1..] {
        match node {
            TypedNode::Logical(n) => assert!(n.is_leaf(), "{} should be a leaf", n.id),
            TypedNode::Geometry(_) => unreachable!(),
        }
    }
    assert!(walk.failures().is_empty());
}

// ============================================================================
// 3. Skip propagation: a skipped type hides itself, not its subtree
// ============================================================================

#[tokio::test]
async fn test_skip_propagates_to_children() {
    let source: MemorySource = [
        RawObject::new("L1", "Level").with_children(["X"]),
        RawObject::new("X", "TypeX").with_children(["G1"]),
        RawObject::new("G1", "Mesh").with_mesh(cube_at(0.0)),
    ]
    .into_iter()
    .collect();

    let out = GraphBuilder::build(traverse(&source, "L1", ["TypeX"])).unwrap();

    assert!(out.logical.node("X").is_none());
    assert!(out.registry.get("G1").is_some());
    assert!(!out.logical.contains_edge("L1", "X"));
    assert_eq!(out.logical.dangling().len(), 1);
    assert_eq!(out.stats.skipped, 1);
    assert!(out.failures.is_empty());
}

// ============================================================================
// 4. Idempotence: two walks of the same snapshot agree
// ============================================================================

#[tokio::test]
async fn test_repeat_walk_is_identical() {
    let source: MemorySource = [
        RawObject::new("site", "Collection").with_children(["l1", "g1", "missing"]),
        RawObject::new("l1", "Level").with_children(["g2"]),
        RawObject::new("g1", "Mesh").with_mesh(cube_at(0.0)),
        RawObject::new("g2", "Mesh").with_mesh(cube_at(3.0)),
    ]
    .into_iter()
    .collect();

    let first = GraphBuilder::build(traverse(&source, "site", Vec::<String>::new())).unwrap();
    let second = GraphBuilder::build(traverse(&source, "site", Vec::<String>::new())).unwrap();

    assert_eq!(first.logical.edges(), second.logical.edges());
    assert_eq!(first.logical.nodes(), second.logical.nodes());
    assert_eq!(first.failures, second.failures);
    assert_eq!(first.stats, second.stats);
}

// ============================================================================
// 5. Parallel walk matches the sequential one
// ============================================================================

#[tokio::test]
async fn test_parallel_equivalent() {
    let mut objects = vec![RawObject::new("site", "Collection")
        .with_children((0..20).map(|i| format!("level-{i}")))];
    for i in 0..20 {
        objects.push(
            RawObject::new(format!("level-{i}"), "Level")
                .with_children([format!("wall-{}", i / 2), format!("wall-{}", i / 2 + 1)]),
        );
    }
    for i in 0..=10 {
        objects.push(RawObject::new(format!("wall-{i}"), "Wall").with_mesh(cube_at(i as f64 * 2.0)));
    }
    let source: MemorySource = objects.into_iter().collect();

    let mut walk = traverse(&source, "site", Vec::<String>::new());
    let seq: Vec<TypedNode> = walk.by_ref().collect::<dualgraph::Result<_>>().unwrap();
    let par = traverse_parallel(&source, "site", Vec::<String>::new(), None).unwrap();

    assert_eq!(ids(&seq), ids(&par.nodes));
    assert_eq!(walk.stats(), par.stats);
    assert_eq!(par.stats.geometry, 11);
}

// ============================================================================
// 6. Per-object failures keep the offending object
// ============================================================================

#[tokio::test]
async fn test_malformed_mesh_recorded() {
    let doc = load_json_str(
        r#"[
            {"applicationId": "site", "speckle_type": "Collection", "containedElementsIds": ["bad", "ok"]},
            {"applicationId": "bad", "speckle_type": "Mesh",
             "displayValue": {"vertices": [0, 0, 0, 1, 0], "faces": [3, 0, 1, 2]}},
            {"applicationId": "ok", "speckle_type": "Wall"}
        ]"#,
    )
    .unwrap();

    let out = GraphBuilder::build(traverse(&doc.source, "site", Vec::<String>::new())).unwrap();

    let record = out.failures.get("bad").unwrap();
    assert_eq!(record.kind, FailureKind::Processing);
    assert!(!out.registry.contains("bad"));
    assert_eq!(record.object.as_ref().map(|o| o.id().as_str()), Some("bad"));
    assert!(out.logical.node("ok").is_some());
    assert!(!out.logical.contains_edge("site", "bad"));
}
