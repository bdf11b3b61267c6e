//! Narrow-phase primitives.
//!
//! Everything works on `DVec3` triangles. Two triangles collide when an edge
//! of one crosses the interior of the other, or when their closest features
//! are within the contact tolerance. The distance half handles touching and
//! coplanar overlap; the crossing half handles proper interpenetration.

use glam::DVec3;

use crate::model::Aabb;

pub type Triangle = [DVec3; 3];

/// Parallel-ray cutoff for Möller–Trumbore.
const RAY_EPSILON: f64 = 1e-12;

/// Fixed, deliberately skewed ray directions for inside tests. Axis-aligned
/// rays would run along the diagonals of axis-aligned faces.
const PROBE_DIRECTIONS: [[f64; 3]; 6] = [
    [1.0, 0.271_8, 0.141_4],
    [-1.0, -0.173_2, 0.316_2],
    [0.223_6, 1.0, -0.244_9],
    [-0.331_6, -1.0, 0.1],
    [0.1, 0.3, 1.0],
    [-0.27, 0.19, -1.0],
];

pub fn triangle_bounds(tri: &Triangle) -> Aabb {
    Aabb::new(tri[0].min(tri[1]).min(tri[2]), tri[0].max(tri[1]).max(tri[2]))
}

/// Do two triangles intersect or come within `tolerance` of each other?
pub fn triangles_collide(a: &Triangle, b: &Triangle, tolerance: f64) -> bool {
    for i in 0..3 {
        let (p, q) = (a[i], a[(i + 1) % 3]);
        if segment_crosses_triangle(p, q, b) {
            return true;
        }
        let (p, q) = (b[i], b[(i + 1) % 3]);
        if segment_crosses_triangle(p, q, a) {
            return true;
        }
    }
    triangle_distance(a, b) <= tolerance
}

/// Minimum distance between two non-crossing triangles.
pub fn triangle_distance(a: &Triangle, b: &Triangle) -> f64 {
    let mut best = f64::INFINITY;
    for &v in a {
        best = best.min(point_triangle_distance(v, b));
    }
    for &v in b {
        best = best.min(point_triangle_distance(v, a));
    }
    for i in 0..3 {
        for j in 0..3 {
            let d = segment_distance(a[i], a[(i + 1) % 3], b[j], b[(j + 1) % 3]);
            best = best.min(d);
        }
    }
    best
}

/// True when the open segment pq passes strictly through the plane of the
/// triangle at a point inside it.
fn segment_crosses_triangle(p: DVec3, q: DVec3, tri: &Triangle) -> bool {
    let normal = (tri[1] - tri[0]).cross(tri[2] - tri[0]);
    if normal.length_squared() == 0.0 {
        return false;
    }
    let dp = normal.dot(p - tri[0]);
    let dq = normal.dot(q - tri[0]);
    if dp * dq >= 0.0 {
        return false;
    }
    let hit = p + (q - p) * (dp / (dp - dq));
    inside_triangle(hit, tri, normal)
}

/// Point known to lie in the triangle's plane: inside or on the boundary?
fn inside_triangle(x: DVec3, tri: &Triangle, normal: DVec3) -> bool {
    (0..3).all(|i| {
        let edge = tri[(i + 1) % 3] - tri[i];
        normal.dot(edge.cross(x - tri[i])) >= 0.0
    })
}

/// Distance from a point to a closed triangle.
pub fn point_triangle_distance(p: DVec3, tri: &Triangle) -> f64 {
    p.distance(closest_point_on_triangle(p, tri))
}

/// Closest point on triangle abc to p, by Voronoi region.
fn closest_point_on_triangle(p: DVec3, tri: &Triangle) -> DVec3 {
    let [a, b, c] = *tri;
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return a + ab * (d1 / (d1 - d3));
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return a + ac * (d2 / (d2 - d6));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        return b + (c - b) * ((d4 - d3) / ((d4 - d3) + (d5 - d6)));
    }

    let denom = va + vb + vc;
    if denom <= 0.0 {
        // Sliver: fall back to the nearest edge.
        return [(a, b), (b, c), (c, a)]
            .into_iter()
            .map(|(s, e)| closest_point_on_segment(p, s, e))
            .min_by(|x, y| p.distance_squared(*x).total_cmp(&p.distance_squared(*y)))
            .unwrap_or(a);
    }
    let v = vb / denom;
    let w = vc / denom;
    a + ab * v + ac * w
}

fn closest_point_on_segment(p: DVec3, s: DVec3, e: DVec3) -> DVec3 {
    let d = e - s;
    let len2 = d.length_squared();
    if len2 == 0.0 {
        return s;
    }
    s + d * ((p - s).dot(d) / len2).clamp(0.0, 1.0)
}

/// Distance between segments p1q1 and p2q2.
pub fn segment_distance(p1: DVec3, q1: DVec3, p2: DVec3, q2: DVec3) -> f64 {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    let (s, t) = if a == 0.0 && e == 0.0 {
        (0.0, 0.0)
    } else if a == 0.0 {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if e == 0.0 {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let mut s = if denom > 0.0 { ((b * f - c * e) / denom).clamp(0.0, 1.0) } else { 0.0 };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };

    (p1 + d1 * s).distance(p2 + d2 * t)
}

/// Möller–Trumbore. Returns the hit parameter along `dir`, positive hits only.
pub fn ray_triangle(origin: DVec3, dir: DVec3, tri: &Triangle) -> Option<f64> {
    let edge1 = tri[1] - tri[0];
    let edge2 = tri[2] - tri[0];
    let h = dir.cross(edge2);
    let a = edge1.dot(h);
    if a.abs() < RAY_EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = origin - tri[0];
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * dir.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    (t > RAY_EPSILON).then_some(t)
}

/// Ray-parity inside test with majority voting over six probe rays.
pub fn point_inside<'a>(point: DVec3, triangles: impl Iterator<Item = &'a Triangle> + Clone) -> bool {
    let votes = PROBE_DIRECTIONS
        .iter()
        .filter(|d| {
            let dir = DVec3::from_array(**d).normalize();
            let hits = triangles
                .clone()
                .filter(|tri| ray_triangle(point, dir, tri).is_some())
                .count();
            hits % 2 == 1
        })
        .count();
    votes * 2 > PROBE_DIRECTIONS.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Mesh;

    fn tri(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> Triangle {
        [DVec3::from_array(a), DVec3::from_array(b), DVec3::from_array(c)]
    }

    fn triangles(mesh: &Mesh) -> Vec<Triangle> {
        (0..mesh.face_count()).map(|i| mesh.triangle(i)).collect()
    }

    #[test]
    fn test_crossing_triangles() {
        let a = tri([0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]);
        let b = tri([0.5, 0.5, -1.0], [0.5, 0.5, 1.0], [3.0, 3.0, 0.5]);
        assert!(triangles_collide(&a, &b, 0.0));
    }

    #[test]
    fn test_separated_triangles() {
        let a = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let b = tri([0.0, 0.0, 0.5], [1.0, 0.0, 0.5], [0.0, 1.0, 0.5]);
        assert!(!triangles_collide(&a, &b, 1e-6));
        assert!(triangles_collide(&a, &b, 0.6));
        assert!((triangle_distance(&a, &b) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_coplanar_overlap_and_touch() {
        let a = tri([0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]);
        let b = tri([0.5, 0.5, 0.0], [3.0, 0.5, 0.0], [0.5, 3.0, 0.0]);
        assert!(triangles_collide(&a, &b, 0.0));

        let touching = tri([2.0, 0.0, 0.0], [3.0, 0.0, 0.0], [3.0, 1.0, 0.0]);
        assert!(triangles_collide(&a, &touching, 1e-9));
    }

    #[test]
    fn test_segment_distance_parallel() {
        let d = segment_distance(
            DVec3::ZERO,
            DVec3::X,
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
        );
        assert!((d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ray_hits_triangle() {
        let t = tri([0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0]);
        let hit = ray_triangle(DVec3::new(0.2, 0.2, 0.0), DVec3::Z, &t);
        assert!(hit.is_some_and(|t| (t - 1.0).abs() < 1e-12));
        assert!(ray_triangle(DVec3::new(0.2, 0.2, 0.0), -DVec3::Z, &t).is_none());
    }

    #[test]
    fn test_point_inside_cube() {
        let cube = triangles(&Mesh::unit_cube(DVec3::ZERO));
        assert!(point_inside(DVec3::splat(0.5), cube.iter()));
        assert!(point_inside(DVec3::new(0.1, 0.9, 0.2), cube.iter()));
        assert!(!point_inside(DVec3::splat(1.5), cube.iter()));
        assert!(!point_inside(DVec3::new(-0.5, 0.5, 0.5), cube.iter()));
    }
}
