//! End-to-end tests for the intersection engine and the geometry graph.

use std::collections::BTreeSet;

use dualgraph::{
    assemble, find_intersections, ConnectedPair, FailureReport, GeometryNode, GeometryRegistry,
    IntersectionOptions, Mesh,
};
use glam::DVec3;
use pretty_assertions::assert_eq;

fn geo(id: &str, mesh: Mesh) -> GeometryNode {
    GeometryNode { id: id.into(), name: id.into(), type_name: "Mesh".into(), mesh }
}

fn pairs(list: &[(&str, &str)]) -> BTreeSet<ConnectedPair> {
    list.iter().filter_map(|&(a, b)| ConnectedPair::new(a, b)).collect()
}

fn run(registry: &GeometryRegistry) -> (BTreeSet<ConnectedPair>, dualgraph::IntersectionStats) {
    let outcome = find_intersections(registry, &mut FailureReport::new(), &IntersectionOptions::default());
    (outcome.pairs, outcome.stats)
}

// ============================================================================
// 1. Completeness: three coincident unit cubes
// ============================================================================

#[tokio::test]
async fn test_three_coincident_cubes() {
    let registry: GeometryRegistry = ["A", "B", "C"]
        .into_iter()
        .map(|id| geo(id, Mesh::unit_cube(DVec3::ZERO)))
        .collect();

    let (found, _) = run(&registry);
    assert_eq!(found, pairs(&[("A", "B"), ("A", "C"), ("B", "C")]));

    let graph = assemble(&registry, &found);
    for id in ["A", "B", "C"] {
        assert_eq!(graph.degree(&id.into()), 2);
    }
}

// ============================================================================
// 2. Isolation: a mesh touching nothing has no edges
// ============================================================================

#[tokio::test]
async fn test_isolated_mesh() {
    let registry: GeometryRegistry = [
        geo("A", Mesh::unit_cube(DVec3::ZERO)),
        geo("B", Mesh::unit_cube(DVec3::new(0.5, 0.5, 0.0))),
        geo("lonely", Mesh::unit_cube(DVec3::new(0.0, 0.0, 5.0))),
    ]
    .into_iter()
    .collect();

    let (found, _) = run(&registry);
    let graph = assemble(&registry, &found);
    assert_eq!(found, pairs(&[("A", "B")]));
    assert!(graph.contains_node("lonely"));
    assert_eq!(graph.degree(&"lonely".into()), 0);
}

// ============================================================================
// 3. Containment and contact
// ============================================================================

#[tokio::test]
async fn test_contained_mesh() {
    let registry: GeometryRegistry = [
        geo("room", Mesh::cuboid(DVec3::ZERO, DVec3::new(6.0, 4.0, 3.0))),
        geo("column", Mesh::cuboid(DVec3::new(2.0, 1.0, 0.5), DVec3::new(2.5, 1.5, 2.5))),
    ]
    .into_iter()
    .collect();

    let (found, stats) = run(&registry);
    assert_eq!(found, pairs(&[("column", "room")]));
    assert!(stats.containment_tests >= 1);
}

#[tokio::test]
async fn test_touching_and_gap() {
    let registry: GeometryRegistry = [
        geo("a", Mesh::unit_cube(DVec3::ZERO)),
        // Shares the face x = 1 with `a`.
        geo("b", Mesh::unit_cube(DVec3::X)),
        // Shares only the edge x = 2, y = 1 with `b`.
        geo("c", Mesh::unit_cube(DVec3::new(2.0, 1.0, 0.0))),
        // 1 mm away from `c`.
        geo("d", Mesh::unit_cube(DVec3::new(3.001, 1.0, 0.0))),
    ]
    .into_iter()
    .collect();

    let (found, _) = run(&registry);
    assert_eq!(found, pairs(&[("a", "b"), ("b", "c")]));

    let loose = IntersectionOptions { contact_tolerance: 0.01, ..Default::default() };
    let outcome = find_intersections(&registry, &mut FailureReport::new(), &loose);
    assert_eq!(outcome.pairs, pairs(&[("a", "b"), ("b", "c"), ("c", "d")]));
}

// ============================================================================
// 4. Setup cost: one insert per usable mesh
// ============================================================================

#[tokio::test]
async fn test_linear_setup_cost() {
    // A row of cubes, each overlapping only its right neighbour.
    let n = 200;
    let registry: GeometryRegistry = (0..n)
        .map(|i| geo(&format!("m{i:03}"), Mesh::unit_cube(DVec3::new(i as f64 * 0.9, 0.0, 0.0))))
        .collect();

    let (found, stats) = run(&registry);
    assert_eq!(stats.meshes_inserted, n as u64);
    assert_eq!(stats.triangles_indexed, 12 * n as u64);
    assert_eq!(found.len(), n - 1);
    for i in 0..n - 1 {
        let pair = ConnectedPair::new(format!("m{i:03}"), format!("m{:03}", i + 1));
        assert!(pair.is_some_and(|p| found.contains(&p)), "missing pair at {i}");
    }
}

// ============================================================================
// 5. Pair symmetry and canonical order
// ============================================================================

#[tokio::test]
async fn test_pairs_canonical() {
    let registry: GeometryRegistry = [
        geo("zeta", Mesh::unit_cube(DVec3::ZERO)),
        geo("alpha", Mesh::unit_cube(DVec3::splat(0.25))),
    ]
    .into_iter()
    .collect();

    let (found, _) = run(&registry);
    let pair = found.iter().next().unwrap();
    assert_eq!(pair.low().as_str(), "alpha");
    assert_eq!(pair.high().as_str(), "zeta");
}
