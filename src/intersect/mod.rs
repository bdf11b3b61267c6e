//! # Intersection Engine
//!
//! Finds every pair of geometry nodes whose closed meshes collide.
//!
//! Every usable mesh is inserted exactly once into a single shared
//! [`CollisionWorld`]; all pairs then come out of one bulk query over it.
//! Setup cost is therefore linear in the number of meshes, never in the
//! number of pairs.

pub mod geometry;
pub mod index;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::failure::FailureReport;
use crate::graph::GeometryRegistry;
use crate::model::{ConnectedPair, RawMesh, RawObject};

pub use index::{CollisionQuery, CollisionWorld, MAX_CELLS_PER_TRIANGLE, MIN_CELL_SIZE};

/// Absolute distance under which two surfaces count as touching.
pub const DEFAULT_CONTACT_TOLERANCE: f64 = 1e-9;

/// Tuning for [`find_intersections`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntersectionOptions {
    pub contact_tolerance: f64,
    /// Grid cell edge; derived from the meshes when `None`.
    pub cell_size: Option<f64>,
}

impl Default for IntersectionOptions {
    fn default() -> Self {
        Self {
            contact_tolerance: DEFAULT_CONTACT_TOLERANCE,
            cell_size: None,
        }
    }
}

/// Counters for one intersection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IntersectionStats {
    /// Meshes registered in the collision world. One per usable mesh.
    pub meshes_inserted: u64,
    pub degenerate: u64,
    pub triangles_indexed: u64,
    pub cells: u64,
    /// Triangles kept out of the grid for spanning too many cells.
    pub overflow_triangles: u64,
    pub cell_size: f64,
    pub triangle_tests: u64,
    pub containment_tests: u64,
    pub pairs: u64,
}

#[derive(Debug, Default)]
pub struct IntersectionOutcome {
    pub pairs: BTreeSet<ConnectedPair>,
    pub stats: IntersectionStats,
}

/// Collide every usable mesh in the registry against every other.
///
/// Degenerate meshes are left out of the world and recorded in `failures`;
/// their nodes stay in the registry untouched.
pub fn find_intersections(
    registry: &GeometryRegistry,
    failures: &mut FailureReport,
    options: &IntersectionOptions,
) -> IntersectionOutcome {
    let mut stats = IntersectionStats::default();

    let usable: Vec<_> = registry
        .iter()
        .filter(|node| match node.mesh.validate() {
            Ok(()) => true,
            Err(defect) => {
                stats.degenerate += 1;
                let object = RawObject::new(&node.id, node.type_name.clone())
                    .with_name(node.name.clone())
                    .with_mesh(RawMesh::from_mesh(&node.mesh));
                failures.record_degenerate(node.id.clone(), Some(object), &defect);
                false
            }
        })
        .collect();

    let cell_size = options
        .cell_size
        .filter(|s| s.is_finite() && *s > 0.0)
        .unwrap_or_else(|| CollisionWorld::auto_cell_size(usable.iter().map(|n| &n.mesh)));

    let mut world = CollisionWorld::new(cell_size, options.contact_tolerance);
    for node in &usable {
        world.insert(node.id.clone(), &node.mesh);
        stats.meshes_inserted += 1;
    }
    stats.triangles_indexed = world.triangle_count() as u64;
    stats.cells = world.cell_count() as u64;
    stats.overflow_triangles = world.overflow_count() as u64;
    stats.cell_size = world.cell_size();

    let query = world.colliding_pairs();
    stats.triangle_tests = query.triangle_tests;
    stats.containment_tests = query.containment_tests;
    stats.pairs = query.pairs.len() as u64;

    tracing::info!(
        meshes = stats.meshes_inserted,
        degenerate = stats.degenerate,
        triangles = stats.triangles_indexed,
        cells = stats.cells,
        overflow = stats.overflow_triangles,
        pairs = stats.pairs,
        "intersection pass complete"
    );

    IntersectionOutcome { pairs: query.pairs, stats }
}
