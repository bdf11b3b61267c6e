//! Shared collision world: one uniform hash grid over the triangles of every
//! mesh in the run.
//!
//! ```text
//! insert(id, mesh) ×N ──▶ grid: cell → [triangle]
//!                               │
//!          colliding_pairs() ───┤ surface phase: triangle pairs per cell (rayon)
//!                               ├ overflow phase: oversized triangles vs all
//!                               └ containment phase: bounds sweep + ray parity
//! ```
//!
//! Each triangle pair is evaluated in exactly one cell: the cell holding the
//! minimum corner of the overlap of the two triangles' reach boxes.
//!
//! A triangle whose reach would cover more than [`MAX_CELLS_PER_TRIANGLE`]
//! cells (a floor slab among small fixtures) stays out of the grid. It goes
//! on the overflow list and is tested against every other triangle whose
//! reach box it overlaps, so grid memory stays linear in the triangle count.

use std::collections::BTreeSet;
use std::ops::Range;

use glam::DVec3;
use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;

use crate::model::{Aabb, ApplicationId, ConnectedPair, Mesh};
use super::geometry::{point_inside, triangle_bounds, triangles_collide, Triangle};

/// Cell edge as a multiple of the mean triangle extent.
const CELL_SIZE_FACTOR: f64 = 2.0;

/// Smallest accepted cell edge, in model units.
pub const MIN_CELL_SIZE: f64 = 1e-3;

/// Grid cells one triangle may occupy before it moves to the overflow list.
pub const MAX_CELLS_PER_TRIANGLE: u64 = 64;

/// Vertices per mesh probed in the containment phase.
const CONTAINMENT_SAMPLES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CellCoord {
    x: i64,
    y: i64,
    z: i64,
}

impl CellCoord {
    fn from_position(pos: DVec3, cell_size: f64) -> Self {
        Self {
            x: (pos.x / cell_size).floor() as i64,
            y: (pos.y / cell_size).floor() as i64,
            z: (pos.z / cell_size).floor() as i64,
        }
    }

    /// Cells in the box spanned by `self` and `hi`, saturating.
    fn span(self, hi: CellCoord) -> u64 {
        let axis = |a: i64, b: i64| b.saturating_sub(a).saturating_add(1).max(1) as u64;
        axis(self.x, hi.x)
            .saturating_mul(axis(self.y, hi.y))
            .saturating_mul(axis(self.z, hi.z))
    }
}

#[derive(Debug)]
struct Body {
    id: ApplicationId,
    bounds: Aabb,
    triangles: Range<usize>,
    samples: Vec<DVec3>,
}

#[derive(Debug)]
struct IndexedTriangle {
    body: u32,
    tri: Triangle,
    /// Triangle bounds grown by the contact tolerance.
    reach: Aabb,
    /// Kept out of the grid, see [`MAX_CELLS_PER_TRIANGLE`].
    oversized: bool,
}

/// Result of a bulk query.
#[derive(Debug, Default)]
pub struct CollisionQuery {
    pub pairs: BTreeSet<ConnectedPair>,
    pub triangle_tests: u64,
    pub containment_tests: u64,
}

/// Every usable mesh of one run, indexed once.
#[derive(Debug)]
pub struct CollisionWorld {
    bodies: Vec<Body>,
    triangles: Vec<IndexedTriangle>,
    grid: HashMap<CellCoord, Vec<u32>>,
    overflow: Vec<u32>,
    cell_size: f64,
    tolerance: f64,
}

impl CollisionWorld {
    pub fn new(cell_size: f64, tolerance: f64) -> Self {
        Self {
            bodies: Vec::new(),
            triangles: Vec::new(),
            grid: HashMap::new(),
            overflow: Vec::new(),
            cell_size: cell_size.max(MIN_CELL_SIZE),
            tolerance: tolerance.max(0.0),
        }
    }

    /// Cell size from the mean triangle extent of the given meshes.
    pub fn auto_cell_size<'a>(meshes: impl IntoIterator<Item = &'a Mesh>) -> f64 {
        let (sum, count) = meshes
            .into_iter()
            .flat_map(|m| (0..m.face_count()).map(move |i| m.triangle(i)))
            .fold((0.0, 0usize), |(sum, count), tri| {
                (sum + triangle_bounds(&tri).extent().max_element(), count + 1)
            });
        if count == 0 || !sum.is_finite() {
            return 1.0;
        }
        (sum / count as f64 * CELL_SIZE_FACTOR).max(MIN_CELL_SIZE)
    }

    /// Register a mesh. The mesh must already have passed `Mesh::validate`.
    pub fn insert(&mut self, id: ApplicationId, mesh: &Mesh) {
        let body = self.bodies.len() as u32;
        let start = self.triangles.len();

        for i in 0..mesh.face_count() {
            let tri = mesh.triangle(i);
            let reach = triangle_bounds(&tri).expanded(self.tolerance);
            let index = self.triangles.len() as u32;
            let lo = CellCoord::from_position(reach.min, self.cell_size);
            let hi = CellCoord::from_position(reach.max, self.cell_size);
            let oversized = lo.span(hi) > MAX_CELLS_PER_TRIANGLE;
            if oversized {
                self.overflow.push(index);
            } else {
                for x in lo.x..=hi.x {
                    for y in lo.y..=hi.y {
                        for z in lo.z..=hi.z {
                            self.grid.entry(CellCoord { x, y, z }).or_default().push(index);
                        }
                    }
                }
            }
            self.triangles.push(IndexedTriangle { body, tri, reach, oversized });
        }

        let vertices = mesh.vertices();
        let stride = (vertices.len() / CONTAINMENT_SAMPLES).max(1);
        let samples = vertices.iter().step_by(stride).take(CONTAINMENT_SAMPLES).copied().collect();

        self.bodies.push(Body {
            id,
            bounds: mesh.bounding_box().unwrap_or(Aabb::new(DVec3::ZERO, DVec3::ZERO)),
            triangles: start..self.triangles.len(),
            samples,
        });
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn cell_count(&self) -> usize {
        self.grid.len()
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Triangles too large for the grid.
    pub fn overflow_count(&self) -> usize {
        self.overflow.len()
    }

    /// All colliding body pairs: surface contact first, then containment.
    pub fn colliding_pairs(&self) -> CollisionQuery {
        let cells: Vec<(&CellCoord, &Vec<u32>)> = self.grid.iter().collect();
        let (grid_hits, grid_tests) = cells
            .par_iter()
            .map(|(coord, members)| self.cell_pairs(**coord, members))
            .reduce(|| (HashSet::new(), 0), merge_hits);
        let (overflow_hits, overflow_tests) = self
            .overflow
            .par_iter()
            .map(|&index| self.overflow_pairs(index))
            .reduce(|| (HashSet::new(), 0), merge_hits);
        let (mut hits, triangle_tests) =
            merge_hits((grid_hits, grid_tests), (overflow_hits, overflow_tests));

        let candidates = self.containment_candidates(&hits);
        let containment_tests = candidates.len() as u64;
        let enclosed: Vec<(u32, u32)> = candidates
            .into_par_iter()
            .filter(|&(a, b)| self.encloses(a, b) || self.encloses(b, a))
            .collect();
        hits.extend(enclosed);

        let pairs = hits
            .into_iter()
            .filter_map(|(a, b)| {
                ConnectedPair::new(&self.bodies[a as usize].id, &self.bodies[b as usize].id)
            })
            .collect();

        CollisionQuery { pairs, triangle_tests, containment_tests }
    }

    fn cell_pairs(&self, coord: CellCoord, members: &[u32]) -> (HashSet<(u32, u32)>, u64) {
        let mut found = HashSet::new();
        let mut tests = 0u64;
        for (i, &ia) in members.iter().enumerate() {
            let ta = &self.triangles[ia as usize];
            for &ib in &members[i + 1..] {
                let tb = &self.triangles[ib as usize];
                if ta.body == tb.body {
                    continue;
                }
                let key = (ta.body.min(tb.body), ta.body.max(tb.body));
                if found.contains(&key) || !ta.reach.overlaps(&tb.reach, 0.0) {
                    continue;
                }
                let owner = CellCoord::from_position(ta.reach.min.max(tb.reach.min), self.cell_size);
                if owner != coord {
                    continue;
                }
                tests += 1;
                if triangles_collide(&ta.tri, &tb.tri, self.tolerance) {
                    found.insert(key);
                }
            }
        }
        (found, tests)
    }

    /// One overflow triangle against every other triangle it can reach. Two
    /// overflow triangles are tested from the lower index only.
    fn overflow_pairs(&self, index: u32) -> (HashSet<(u32, u32)>, u64) {
        let ta = &self.triangles[index as usize];
        let mut found = HashSet::new();
        let mut tests = 0u64;
        for (ib, tb) in self.triangles.iter().enumerate() {
            if tb.body == ta.body || (tb.oversized && ib as u32 <= index) {
                continue;
            }
            let key = (ta.body.min(tb.body), ta.body.max(tb.body));
            if found.contains(&key) || !ta.reach.overlaps(&tb.reach, 0.0) {
                continue;
            }
            tests += 1;
            if triangles_collide(&ta.tri, &tb.tri, self.tolerance) {
                found.insert(key);
            }
        }
        (found, tests)
    }

    /// Body pairs whose bounds nest and that have no surface contact.
    fn containment_candidates(&self, hits: &HashSet<(u32, u32)>) -> Vec<(u32, u32)> {
        let mut order: Vec<u32> = (0..self.bodies.len() as u32).collect();
        order.sort_by(|&a, &b| {
            self.bodies[a as usize].bounds.min.x.total_cmp(&self.bodies[b as usize].bounds.min.x)
        });

        let mut out = Vec::new();
        for (i, &a) in order.iter().enumerate() {
            let ba = &self.bodies[a as usize];
            for &b in &order[i + 1..] {
                let bb = &self.bodies[b as usize];
                if bb.bounds.min.x > ba.bounds.max.x + self.tolerance {
                    break;
                }
                let key = (a.min(b), a.max(b));
                if hits.contains(&key) {
                    continue;
                }
                if self.nests(ba, bb) || self.nests(bb, ba) {
                    out.push(key);
                }
            }
        }
        out
    }

    fn nests(&self, outer: &Body, inner: &Body) -> bool {
        let grown = outer.bounds.expanded(self.tolerance);
        grown.contains_point(inner.bounds.min) && grown.contains_point(inner.bounds.max)
    }

    /// Is `inner` inside the closed surface of `outer`?
    ///
    /// Only asked for pairs without surface contact, so the inner surface is
    /// entirely on one side; any sampled vertex decides.
    fn encloses(&self, outer: u32, inner: u32) -> bool {
        let outer = &self.bodies[outer as usize];
        let inner = &self.bodies[inner as usize];
        if !self.nests(outer, inner) {
            return false;
        }
        let shell = self.triangles[outer.triangles.clone()].iter().map(|t| &t.tri);
        inner.samples.iter().any(|&p| point_inside(p, shell.clone()))
    }
}

fn merge_hits(
    (mut acc, n): (HashSet<(u32, u32)>, u64),
    (part, m): (HashSet<(u32, u32)>, u64),
) -> (HashSet<(u32, u32)>, u64) {
    acc.extend(part);
    (acc, n + m)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world(meshes: &[(&str, Mesh)]) -> CollisionWorld {
        let size = CollisionWorld::auto_cell_size(meshes.iter().map(|(_, m)| m));
        let mut world = CollisionWorld::new(size, 1e-9);
        for (id, mesh) in meshes {
            world.insert((*id).into(), mesh);
        }
        world
    }

    fn pair(a: &str, b: &str) -> ConnectedPair {
        ConnectedPair::new(a, b).unwrap()
    }

    #[test]
    fn test_overlapping_and_separate() {
        let w = world(&[
            ("a", Mesh::unit_cube(DVec3::ZERO)),
            ("b", Mesh::unit_cube(DVec3::splat(0.5))),
            ("c", Mesh::unit_cube(DVec3::new(5.0, 0.0, 0.0))),
        ]);
        let q = w.colliding_pairs();
        assert_eq!(q.pairs, BTreeSet::from([pair("a", "b")]));
        assert_eq!(w.len(), 3);
        assert_eq!(w.triangle_count(), 36);
    }

    #[test]
    fn test_face_contact_counts() {
        let w = world(&[
            ("a", Mesh::unit_cube(DVec3::ZERO)),
            ("b", Mesh::unit_cube(DVec3::X)),
        ]);
        assert_eq!(w.colliding_pairs().pairs, BTreeSet::from([pair("a", "b")]));
    }

    #[test]
    fn test_gap_does_not_count() {
        let w = world(&[
            ("a", Mesh::unit_cube(DVec3::ZERO)),
            ("b", Mesh::unit_cube(DVec3::new(1.01, 0.0, 0.0))),
        ]);
        assert!(w.colliding_pairs().pairs.is_empty());
    }

    #[test]
    fn test_contained_mesh_collides() {
        let w = world(&[
            ("big", Mesh::cuboid(DVec3::ZERO, DVec3::splat(10.0))),
            ("small", Mesh::cuboid(DVec3::splat(4.0), DVec3::splat(5.0))),
        ]);
        let q = w.colliding_pairs();
        assert_eq!(q.pairs, BTreeSet::from([pair("big", "small")]));
        assert_eq!(q.containment_tests, 1);
    }

    #[test]
    fn test_nested_bounds_but_outside() {
        // Two shells in one mesh: the small cube sits in the gap between them,
        // inside the combined bounds but outside both solids.
        let left = Mesh::unit_cube(DVec3::ZERO);
        let right = Mesh::unit_cube(DVec3::splat(9.0));
        let offset = left.vertex_count() as u32;
        let vertices = left.vertices().iter().chain(right.vertices()).copied().collect();
        let faces = left
            .faces()
            .iter()
            .copied()
            .chain(right.faces().iter().map(|f| f.map(|i| i + offset)))
            .collect();

        let w = world(&[
            ("pair", Mesh::from_parts(vertices, faces)),
            ("cube", Mesh::unit_cube(DVec3::splat(4.5))),
        ]);
        let q = w.colliding_pairs();
        assert!(q.pairs.is_empty());
        assert_eq!(q.containment_tests, 1);
    }

    #[test]
    fn test_large_triangles_bypass_grid() {
        // A floor slab under many small fixtures: the slab's faces would
        // cover thousands of cells each at the fixtures' scale.
        let mut meshes = vec![(
            "slab".to_string(),
            Mesh::cuboid(DVec3::ZERO, DVec3::new(40.0, 40.0, 0.2)),
        )];
        for i in 0..200 {
            let x = 0.5 + (i % 20) as f64 * 1.9;
            let y = 0.5 + (i / 20) as f64 * 1.9;
            let z = if i % 2 == 0 { 0.2 } else { 1.0 };
            let min = DVec3::new(x, y, z);
            meshes.push((format!("f{i:03}"), Mesh::cuboid(min, min + DVec3::splat(0.01))));
        }
        let refs: Vec<(&str, Mesh)> =
            meshes.iter().map(|(id, m)| (id.as_str(), m.clone())).collect();
        let w = world(&refs);

        assert!(w.overflow_count() >= 12);
        assert!(w.cell_count() <= w.triangle_count() * MAX_CELLS_PER_TRIANGLE as usize);

        let expected: BTreeSet<ConnectedPair> =
            (0..200).step_by(2).map(|i| pair("slab", &format!("f{i:03}"))).collect();
        assert_eq!(w.colliding_pairs().pairs, expected);
    }

    #[test]
    fn test_two_oversized_triangles_collide() {
        let mut w = CollisionWorld::new(MIN_CELL_SIZE, 1e-9);
        w.insert("a".into(), &Mesh::unit_cube(DVec3::ZERO));
        w.insert("b".into(), &Mesh::unit_cube(DVec3::splat(0.5)));
        assert_eq!(w.overflow_count(), 24);
        assert_eq!(w.cell_count(), 0);
        assert_eq!(w.colliding_pairs().pairs, BTreeSet::from([pair("a", "b")]));
    }
}
