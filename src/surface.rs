//! Ground surfaces particles are glued to.
//!
//! A [`SurfaceProjector`] answers one question: given a point, where is the
//! closest point on the surface and which way does the surface face there.
//! The stepping code treats it as an opaque synchronous function.

use crate::error::ConfigError;
use glam::DVec3;

/// Closest surface point and the surface normal at it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfacePoint {
    pub point: DVec3,
    pub normal: DVec3,
}

/// Closest-point-on-surface queries.
///
/// Implementations must be pure per call so particles can be stepped in
/// any order (or in parallel).
pub trait SurfaceProjector: Send + Sync {
    /// Project `point` onto the surface.
    fn project(&self, point: DVec3) -> SurfacePoint;
}

impl<F> SurfaceProjector for F
where
    F: Fn(DVec3) -> SurfacePoint + Send + Sync,
{
    fn project(&self, point: DVec3) -> SurfacePoint {
        self(point)
    }
}

/// Infinite plane through `origin`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    origin: DVec3,
    normal: DVec3,
}

impl Plane {
    /// Plane through `origin` facing `normal`. The normal is normalized.
    pub fn new(origin: DVec3, normal: DVec3) -> Result<Self, ConfigError> {
        let normal = normal.normalize_or_zero();
        if normal == DVec3::ZERO || !origin.is_finite() {
            return Err(ConfigError::DegeneratePlane);
        }
        Ok(Self { origin, normal })
    }

    /// Horizontal ground at `height`, facing +Z.
    pub fn ground(height: f64) -> Self {
        Self {
            origin: DVec3::new(0.0, 0.0, height),
            normal: DVec3::Z,
        }
    }

    pub fn normal(&self) -> DVec3 {
        self.normal
    }
}

impl SurfaceProjector for Plane {
    fn project(&self, point: DVec3) -> SurfacePoint {
        let offset = (point - self.origin).dot(self.normal);
        SurfacePoint {
            point: point - self.normal * offset,
            normal: self.normal,
        }
    }
}

/// Triangle soup projected by exhaustive closest-point search.
#[derive(Clone, Debug)]
pub struct TriangleMesh {
    vertices: Vec<DVec3>,
    triangles: Vec<[usize; 3]>,
    normals: Vec<DVec3>,
}

impl TriangleMesh {
    /// Build a mesh, validating every triangle index.
    pub fn new(vertices: Vec<DVec3>, triangles: Vec<[usize; 3]>) -> Result<Self, ConfigError> {
        if triangles.is_empty() {
            return Err(ConfigError::EmptySurface);
        }
        let count = vertices.len();
        for (triangle, tri) in triangles.iter().enumerate() {
            if let Some(&vertex) = tri.iter().find(|&&v| v >= count) {
                return Err(ConfigError::SurfaceIndex { triangle, vertex, count });
            }
        }

        let normals: Vec<DVec3> = triangles
            .iter()
            .map(|&[a, b, c]| {
                (vertices[b] - vertices[a])
                    .cross(vertices[c] - vertices[a])
                    .normalize_or_zero()
            })
            .collect();
        let degenerate = normals.iter().filter(|n| **n == DVec3::ZERO).count();
        if degenerate > 0 {
            log::warn!("ground mesh has {} zero-area triangles", degenerate);
        }

        Ok(Self { vertices, triangles, normals })
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

impl SurfaceProjector for TriangleMesh {
    fn project(&self, point: DVec3) -> SurfacePoint {
        let mut best = SurfacePoint { point, normal: DVec3::Z };
        let mut best_sq = f64::INFINITY;

        for (tri, normal) in self.triangles.iter().zip(&self.normals) {
            let [a, b, c] = tri.map(|i| self.vertices[i]);
            let closest = closest_point_on_triangle(point, a, b, c);
            let dist_sq = closest.distance_squared(point);
            if dist_sq < best_sq {
                best_sq = dist_sq;
                best = SurfacePoint { point: closest, normal: *normal };
            }
        }

        best
    }
}

/// Closest point to `p` on triangle `abc`, by Voronoi region.
pub fn closest_point_on_triangle(p: DVec3, a: DVec3, b: DVec3, c: DVec3) -> DVec3 {
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
        let denom = d1 - d3;
        let v = if denom != 0.0 { d1 / denom } else { 0.0 };
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let denom = d2 - d6;
        let w = if denom != 0.0 { d2 / denom } else { 0.0 };
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let denom = (d4 - d3) + (d5 - d6);
        let w = if denom != 0.0 { (d4 - d3) / denom } else { 0.0 };
        return b + (c - b) * w;
    }

    let sum = va + vb + vc;
    if sum == 0.0 {
        return a;
    }
    let v = vb / sum;
    let w = vc / sum;
    a + ab * v + ac * w
}
