//! Convex polygon geometry (§4.1, §4.3 Convex–Convex SAT).

use super::{segment_segment_intersection, ShapeHit};
use crate::math::{cross, rotate90cw, try_normalized, Aabb, Iso, Vec2};

/// A convex polygon: vertices wound counter-clockwise, not re-validated per step.
///
/// Outward edge normals ("axes" in §3's DATA MODEL) are precomputed alongside the
/// vertices so SAT never has to recompute them per call.
#[derive(Debug, Clone)]
pub struct Polygon {
    vertices: Vec<Vec2>,
    /// Outward unit normal for edge `i`, between `vertices[i]` and `vertices[(i + 1) % n]`.
    normals: Vec<Vec2>,
}

impl Polygon {
    /// Build from counter-clockwise wound vertices, precomputing outward edge normals.
    pub fn new(vertices: Vec<Vec2>) -> Self {
        let n = vertices.len();
        let normals = (0..n)
            .map(|i| {
                let a = vertices[i];
                let b = vertices[(i + 1) % n];
                try_normalized(rotate90cw(b - a))
            })
            .collect();
        Self { vertices, normals }
    }

    /// An axis-aligned rectangle of the given width/height, centered on the origin.
    pub fn rectangle(width: f64, height: f64) -> Vec<Vec2> {
        let hw = width / 2.0;
        let hh = height / 2.0;
        vec![
            Vec2::new(hw, hh),
            Vec2::new(-hw, hh),
            Vec2::new(-hw, -hh),
            Vec2::new(hw, -hh),
        ]
    }

    /// Local-space vertices.
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    /// Outward edge normals, one per edge, parallel to [`Self::vertices`].
    pub fn normals(&self) -> &[Vec2] {
        &self.normals
    }

    /// World-space vertex `i`.
    pub fn world_vertex(&self, iso: Iso, i: usize) -> Vec2 {
        iso.transform_point(self.vertices[i])
    }

    /// World-space outward normal for edge `i`.
    pub fn world_normal(&self, iso: Iso, i: usize) -> Vec2 {
        iso.transform_vector(self.normals[i])
    }

    /// Support point: the vertex with the greatest projection along `direction` (world space).
    pub fn support(&self, iso: Iso, direction: Vec2) -> (usize, Vec2) {
        let local_dir = crate::math::rotate(direction, -iso.angle);
        let mut best_index = 0;
        let mut best_dot = f64::NEG_INFINITY;
        for (i, v) in self.vertices.iter().enumerate() {
            let dot = v.dot(local_dir);
            if dot > best_dot {
                best_dot = dot;
                best_index = i;
            }
        }
        (best_index, iso.transform_point(self.vertices[best_index]))
    }

    pub(crate) fn area(&self) -> f64 {
        let n = self.vertices.len();
        let mut sum = 0.0;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            sum += cross(a, b);
        }
        (sum / 2.0).abs()
    }

    pub(crate) fn bounding_radius(&self) -> f64 {
        self.vertices
            .iter()
            .map(|v| v.magnitude())
            .fold(0.0, f64::max)
    }

    pub(crate) fn compute_aabb(&self, iso: Iso) -> Aabb {
        let mut min = Vec2::new(f64::INFINITY, f64::INFINITY);
        let mut max = Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for i in 0..self.vertices.len() {
            let world = self.world_vertex(iso, i);
            min = Vec2::partial_min(min, world);
            max = Vec2::partial_max(max, world);
        }
        Aabb { min, max }
    }

    /// Moment of inertia about the local origin, using the standard polygon formula
    /// (sum over edges of the triangle-fan cross/dot terms), scaled to the given mass.
    pub(crate) fn compute_moment_of_inertia(&self, mass: f64) -> f64 {
        let n = self.vertices.len();
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            let cross_ab = cross(a, b).abs();
            numerator += cross_ab * (a.dot(a) + a.dot(b) + b.dot(b));
            denominator += cross_ab;
        }
        if denominator.abs() <= f64::EPSILON {
            return 0.0;
        }
        mass / 6.0 * numerator / denominator
    }

    pub(crate) fn raycast(
        &self,
        from: Vec2,
        to: Vec2,
        iso: Iso,
        skip_backfaces: bool,
    ) -> Option<ShapeHit> {
        let n = self.vertices.len();
        let mut best: Option<ShapeHit> = None;
        for i in 0..n {
            let a = self.world_vertex(iso, i);
            let b = self.world_vertex(iso, (i + 1) % n);
            let normal = self.world_normal(iso, i);
            if skip_backfaces && normal.dot(to - from) > 0.0 {
                continue;
            }
            if let Some(mut hit) = segment_segment_intersection(from, to, a, b) {
                hit.normal = normal;
                hit.face_index = Some(i);
                if best.as_ref().map_or(true, |b| hit.distance < b.distance) {
                    best = Some(hit);
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_area_matches_width_times_height() {
        let polygon = Polygon::new(Polygon::rectangle(2.0, 3.0));
        assert!((polygon.area() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn rectangle_normals_point_outward() {
        let polygon = Polygon::new(Polygon::rectangle(2.0, 2.0));
        let iso = Iso::new(Vec2::zero(), 0.0);
        // Edge 0 goes from (1,1) to (-1,1): the top edge, outward normal is +y.
        let normal = polygon.world_normal(iso, 0);
        assert!((normal - Vec2::new(0.0, 1.0)).magnitude() < 1e-9);
    }

    #[test]
    fn support_point_picks_extreme_vertex() {
        let polygon = Polygon::new(Polygon::rectangle(2.0, 2.0));
        let iso = Iso::new(Vec2::zero(), 0.0);
        let (_, point) = polygon.support(iso, Vec2::new(1.0, 0.0));
        assert!((point.x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn raycast_hits_nearest_edge() {
        let polygon = Polygon::new(Polygon::rectangle(2.0, 2.0));
        let iso = Iso::new(Vec2::zero(), 0.0);
        let hit = polygon
            .raycast(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0), iso, false)
            .expect("ray should hit rectangle");
        assert!((hit.point.x + 1.0).abs() < 1e-9);
    }
}
