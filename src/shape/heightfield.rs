//! Horizontal heightfield geometry (§4.1, §4.3 Circle/Convex–Heightfield).

use super::{segment_segment_intersection, ShapeHit};
use crate::math::{Aabb, Iso, Vec2};

/// A horizontal heightfield: `heights.len()` samples spaced `spacing` apart along
/// local +x, starting at local x = 0. The area below the sampled surface is solid.
#[derive(Debug, Clone)]
pub struct Heightfield {
    heights: Vec<f64>,
    spacing: f64,
}

impl Heightfield {
    pub fn new(heights: Vec<f64>, spacing: f64) -> Self {
        Self { heights, spacing }
    }

    /// Sample spacing along local x.
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Height at sample `index`, clamped to the valid range.
    pub fn height_at(&self, index: i64) -> f64 {
        let clamped = index.clamp(0, self.heights.len() as i64 - 1) as usize;
        self.heights[clamped]
    }

    /// Local-space endpoints of segment `index` (between sample `index` and `index + 1`).
    pub fn segment(&self, index: i64) -> (Vec2, Vec2) {
        let a = Vec2::new(index as f64 * self.spacing, self.height_at(index));
        let b = Vec2::new((index + 1) as f64 * self.spacing, self.height_at(index + 1));
        (a, b)
    }

    /// Inclusive sample-index range (possibly extending past the stored samples, which
    /// clamp via [`Self::height_at`]) covering the horizontal extent `[x_min, x_max]`
    /// expressed in the heightfield's local frame.
    pub fn index_range(&self, x_min: f64, x_max: f64) -> (i64, i64) {
        let lo = (x_min / self.spacing).floor() as i64 - 1;
        let hi = (x_max / self.spacing).ceil() as i64 + 1;
        let max_index = self.heights.len() as i64 - 1;
        (lo.max(0), hi.min(max_index).max(0))
    }

    pub(crate) fn max_height(&self) -> f64 {
        self.heights.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }

    /// The surface is solid below the samples, so the AABB is unbounded in x and -y;
    /// only the top (highest sampled point) is a real bound.
    pub(crate) fn compute_aabb(&self, iso: Iso) -> Aabb {
        let max_x = self.heights.len().saturating_sub(1) as f64 * self.spacing;
        let top_y = [
            iso.transform_point(Vec2::new(0.0, self.max_height())).y,
            iso.transform_point(Vec2::new(max_x, self.max_height())).y,
        ]
        .into_iter()
        .fold(f64::NEG_INFINITY, f64::max);
        Aabb {
            min: Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            max: Vec2::new(f64::INFINITY, top_y),
        }
    }

    pub(crate) fn raycast(
        &self,
        from: Vec2,
        to: Vec2,
        iso: Iso,
        skip_backfaces: bool,
    ) -> Option<ShapeHit> {
        let local_from = crate::math::rotate(from - iso.pos, -iso.angle);
        let local_to = crate::math::rotate(to - iso.pos, -iso.angle);
        let x_min = local_from.x.min(local_to.x);
        let x_max = local_from.x.max(local_to.x);
        let (lo, hi) = self.index_range(x_min, x_max);

        let query_low_y = local_from.y.min(local_to.y);
        if query_low_y > self.max_height() {
            return None;
        }

        let mut best: Option<ShapeHit> = None;
        for index in lo..hi {
            let (a_local, b_local) = self.segment(index);
            let a = iso.transform_point(a_local);
            let b = iso.transform_point(b_local);
            let world_normal =
                iso.transform_vector(crate::math::try_normalized(crate::math::rotate90cw(
                    b_local - a_local,
                )));
            if skip_backfaces && world_normal.dot(to - from) > 0.0 {
                continue;
            }
            if let Some(mut hit) = segment_segment_intersection(from, to, a, b) {
                hit.normal = world_normal;
                hit.face_index = Some(index.max(0) as usize);
                if best.as_ref().map_or(true, |existing| hit.distance < existing.distance) {
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
    fn index_range_covers_queried_extent() {
        let hf = Heightfield::new(vec![0.0, 1.0, 0.5, 2.0], 1.0);
        let (lo, hi) = hf.index_range(0.5, 2.5);
        assert!(lo <= 0);
        assert!(hi >= 2);
    }

    #[test]
    fn raycast_hits_top_surface() {
        let hf = Heightfield::new(vec![0.0, 0.0, 0.0], 1.0);
        let iso = Iso::new(Vec2::zero(), 0.0);
        let hit = hf
            .raycast(Vec2::new(0.5, 5.0), Vec2::new(0.5, -5.0), iso, false)
            .expect("ray should hit the flat surface");
        assert!((hit.point.y - 0.0).abs() < 1e-9);
    }

    #[test]
    fn raycast_misses_when_ray_stays_above_peak() {
        let hf = Heightfield::new(vec![0.0, 0.0], 1.0);
        let iso = Iso::new(Vec2::zero(), 0.0);
        assert!(hf
            .raycast(Vec2::new(0.5, 5.0), Vec2::new(0.5, 1.0), iso, false)
            .is_none());
    }
}
