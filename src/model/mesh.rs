//! Triangle mesh carried by geometry nodes.
//!
//! All coordinates are f64. Faces are triangles; polygons from the source
//! are fan-triangulated before they get here (see `model::raw`).

use glam::DVec3;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Grid used to weld coincident vertices before the manifold check.
const WELD_EPSILON: f64 = 1e-9;

/// Relative tolerance for zero area / zero volume.
const DEGENERATE_EPSILON: f64 = 1e-12;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Bounds of a set of points; `None` when empty.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a DVec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
        Some(Self { min, max })
    }

    /// Boxes overlap or lie within `tolerance` of each other.
    pub fn overlaps(&self, other: &Aabb, tolerance: f64) -> bool {
        self.min.x <= other.max.x + tolerance && other.min.x <= self.max.x + tolerance &&
        self.min.y <= other.max.y + tolerance && other.min.y <= self.max.y + tolerance &&
        self.min.z <= other.max.z + tolerance && other.min.z <= self.max.z + tolerance
    }

    pub fn contains_point(&self, p: DVec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    pub fn extent(&self) -> DVec3 {
        self.max - self.min
    }

    pub fn expanded(&self, by: f64) -> Self {
        Self { min: self.min - DVec3::splat(by), max: self.max + DVec3::splat(by) }
    }
}

/// Reason a mesh cannot take part in collision testing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshDefect {
    #[error("mesh has no vertices")]
    NoVertices,

    #[error("mesh has no faces")]
    NoFaces,

    #[error("vertex {0} has a non-finite coordinate")]
    NonFiniteVertex(usize),

    #[error("face {face} references vertex {index}, mesh has {vertex_count}")]
    IndexOutOfRange { face: usize, index: u32, vertex_count: usize },

    #[error("every face has zero area")]
    ZeroArea,

    #[error("{0} edges are not shared by exactly two faces")]
    NonManifold(usize),

    #[error("enclosed volume is zero")]
    ZeroVolume,
}

/// A triangle mesh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    vertices: Vec<DVec3>,
    faces: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(vertices: Vec<DVec3>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Closed box with outward-facing triangles.
    pub fn cuboid(min: DVec3, max: DVec3) -> Self {
        let vertices = vec![
            DVec3::new(min.x, min.y, min.z),
            DVec3::new(max.x, min.y, min.z),
            DVec3::new(max.x, max.y, min.z),
            DVec3::new(min.x, max.y, min.z),
            DVec3::new(min.x, min.y, max.z),
            DVec3::new(max.x, min.y, max.z),
            DVec3::new(max.x, max.y, max.z),
            DVec3::new(min.x, max.y, max.z),
        ];
        let faces = vec![
            [0, 2, 1], [0, 3, 2], // bottom
            [4, 5, 6], [4, 6, 7], // top
            [0, 1, 5], [0, 5, 4], // front
            [3, 7, 6], [3, 6, 2], // back
            [0, 4, 7], [0, 7, 3], // left
            [1, 2, 6], [1, 6, 5], // right
        ];
        Self { vertices, faces }
    }

    /// Unit cube with its minimum corner at `origin`.
    pub fn unit_cube(origin: DVec3) -> Self {
        Self::cuboid(origin, origin + DVec3::ONE)
    }

    pub fn add_vertex(&mut self, position: DVec3) -> u32 {
        let index = self.vertices.len() as u32;
        self.vertices.push(position);
        index
    }

    pub fn add_triangle(&mut self, v0: u32, v1: u32, v2: u32) {
        self.faces.push([v0, v1, v2]);
    }

    #[inline]
    pub fn vertices(&self) -> &[DVec3] {
        &self.vertices
    }

    #[inline]
    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Corner positions of face `index`. Caller guarantees valid indices.
    #[inline]
    pub fn triangle(&self, index: usize) -> [DVec3; 3] {
        let [a, b, c] = self.faces[index];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    pub fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_points(&self.vertices)
    }

    /// Signed enclosed volume (divergence theorem). Positive for outward
    /// winding. Meaningless unless `validate` passed.
    pub fn signed_volume(&self) -> f64 {
        self.faces
            .iter()
            .map(|&[a, b, c]| {
                let (a, b, c) = (
                    self.vertices[a as usize],
                    self.vertices[b as usize],
                    self.vertices[c as usize],
                );
                a.dot(b.cross(c))
            })
            .sum::<f64>()
            / 6.0
    }

    /// Check the mesh can be used as a closed solid.
    pub fn validate(&self) -> Result<(), MeshDefect> {
        if self.vertices.is_empty() {
            return Err(MeshDefect::NoVertices);
        }
        if self.faces.is_empty() {
            return Err(MeshDefect::NoFaces);
        }
        if let Some(i) = self.vertices.iter().position(|v| !v.is_finite()) {
            return Err(MeshDefect::NonFiniteVertex(i));
        }

        let vertex_count = self.vertices.len();
        for (face, tri) in self.faces.iter().enumerate() {
            if let Some(&index) = tri.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(MeshDefect::IndexOutOfRange { face, index, vertex_count });
            }
        }

        // Bounds exist: vertices are non-empty.
        let scale = self
            .bounding_box()
            .map(|b| b.extent().length())
            .unwrap_or(0.0)
            .max(f64::MIN_POSITIVE);

        let area_floor = DEGENERATE_EPSILON * scale * scale;
        let has_area = (0..self.faces.len()).any(|i| {
            let [a, b, c] = self.triangle(i);
            (b - a).cross(c - a).length() > area_floor
        });
        if !has_area {
            return Err(MeshDefect::ZeroArea);
        }

        let open_edges = self.non_manifold_edge_count();
        if open_edges > 0 {
            return Err(MeshDefect::NonManifold(open_edges));
        }

        if self.signed_volume().abs() <= DEGENERATE_EPSILON * scale * scale * scale {
            return Err(MeshDefect::ZeroVolume);
        }

        Ok(())
    }

    /// Edges (after welding coincident vertices) not used by exactly two faces.
    fn non_manifold_edge_count(&self) -> usize {
        let mut weld: HashMap<[i64; 3], u32> = HashMap::with_capacity(self.vertices.len());
        let canonical: Vec<u32> = self
            .vertices
            .iter()
            .map(|v| {
                let key = [
                    (v.x / WELD_EPSILON).round() as i64,
                    (v.y / WELD_EPSILON).round() as i64,
                    (v.z / WELD_EPSILON).round() as i64,
                ];
                let next = weld.len() as u32;
                *weld.entry(key).or_insert(next)
            })
            .collect();

        let mut edges: HashMap<(u32, u32), u32> = HashMap::with_capacity(self.faces.len() * 3);
        for tri in &self.faces {
            for k in 0..3 {
                let a = canonical[tri[k] as usize];
                let b = canonical[tri[(k + 1) % 3] as usize];
                if a == b {
                    continue;
                }
                *edges.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }
        edges.values().filter(|&&n| n != 2).count()
    }
}
