//! Uniform toroidal grid broadphase, the default implementation (§4.2).

use std::collections::{HashMap, HashSet};

use slotmap::{Key, SlotMap};

use super::{canonical_pair, can_collide, Broadphase};
use crate::body::{Body, BodyId};
use crate::config::{BroadphaseConfig, HUGE_LIMIT};
use crate::math::Aabb;

/// Uniform grid of `width x height` cells of side `cell_size`, wrapping toroidally.
/// Bodies whose AABB covers more than [`HUGE_LIMIT`] cells, or whose bounds are
/// non-finite, go into a separate "huge" set that is always considered a candidate.
pub struct SpatialHash {
    config: BroadphaseConfig,
    cells: HashMap<(i64, i64), Vec<BodyId>>,
    huge: HashSet<BodyId>,
}

impl SpatialHash {
    pub fn new(config: BroadphaseConfig) -> Self {
        Self {
            config,
            cells: HashMap::new(),
            huge: HashSet::new(),
        }
    }

    fn cell_of(&self, point: crate::math::Vec2) -> (i64, i64) {
        let cx = (point.x / self.config.cell_size).floor() as i64;
        let cy = (point.y / self.config.cell_size).floor() as i64;
        (
            cx.rem_euclid(self.config.width as i64),
            cy.rem_euclid(self.config.height as i64),
        )
    }

    /// The rectangular range of cells an AABB covers, or `None` when it should be
    /// filed into the huge set instead (non-finite bounds or too many cells).
    fn cell_range(&self, aabb: Aabb) -> Option<((i64, i64), (i64, i64))> {
        if !aabb.min.x.is_finite()
            || !aabb.min.y.is_finite()
            || !aabb.max.x.is_finite()
            || !aabb.max.y.is_finite()
        {
            return None;
        }
        let (min_cx, min_cy) = self.raw_cell(aabb.min);
        let (max_cx, max_cy) = self.raw_cell(aabb.max);
        let cols = (max_cx - min_cx + 1).max(1) as u64;
        let rows = (max_cy - min_cy + 1).max(1) as u64;
        if cols.saturating_mul(rows) as usize > HUGE_LIMIT {
            return None;
        }
        Some(((min_cx, min_cy), (max_cx, max_cy)))
    }

    fn raw_cell(&self, point: crate::math::Vec2) -> (i64, i64) {
        (
            (point.x / self.config.cell_size).floor() as i64,
            (point.y / self.config.cell_size).floor() as i64,
        )
    }

    fn rebuild(&mut self, bodies: &SlotMap<BodyId, Body>) {
        self.cells.clear();
        self.huge.clear();
        for (id, body) in bodies.iter() {
            match self.cell_range(body.get_aabb()) {
                None => {
                    self.huge.insert(id);
                }
                Some(((min_cx, min_cy), (max_cx, max_cy))) => {
                    for cx in min_cx..=max_cx {
                        for cy in min_cy..=max_cy {
                            let wrapped = (
                                cx.rem_euclid(self.config.width as i64),
                                cy.rem_euclid(self.config.height as i64),
                            );
                            self.cells.entry(wrapped).or_default().push(id);
                        }
                    }
                }
            }
        }
    }

    fn candidates(&self, aabb: Aabb) -> HashSet<BodyId> {
        let mut found: HashSet<BodyId> = self.huge.iter().copied().collect();
        match self.cell_range(aabb) {
            None => {
                // A huge query AABB: every cell is potentially relevant.
                for ids in self.cells.values() {
                    found.extend(ids.iter().copied());
                }
            }
            Some(((min_cx, min_cy), (max_cx, max_cy))) => {
                for cx in min_cx..=max_cx {
                    for cy in min_cy..=max_cy {
                        let wrapped = (
                            cx.rem_euclid(self.config.width as i64),
                            cy.rem_euclid(self.config.height as i64),
                        );
                        if let Some(ids) = self.cells.get(&wrapped) {
                            found.extend(ids.iter().copied());
                        }
                    }
                }
            }
        }
        found
    }
}

impl Broadphase for SpatialHash {
    fn collision_pairs(&mut self, bodies: &SlotMap<BodyId, Body>) -> Vec<(BodyId, BodyId)> {
        self.rebuild(bodies);

        let mut pairs = HashSet::new();
        for (id, body) in bodies.iter() {
            if body.is_static() {
                // Enumerated only from the non-static side so static-static (already
                // excluded by `can_collide`) pairs are never considered.
                continue;
            }
            for other in self.candidates(body.get_aabb()) {
                if other == id {
                    continue;
                }
                let Some(other_body) = bodies.get(other) else {
                    continue;
                };
                if !can_collide(body, other_body) {
                    continue;
                }
                pairs.insert(canonical_pair(id, other));
            }
        }

        let mut out: Vec<_> = pairs.into_iter().collect();
        out.sort_by_key(|(a, b)| (a.data().as_ffi(), b.data().as_ffi()));
        out
    }

    fn aabb_query(&self, bodies: &SlotMap<BodyId, Body>, aabb: Aabb) -> Vec<BodyId> {
        self.candidates(aabb)
            .into_iter()
            .filter(|id| {
                bodies
                    .get(*id)
                    .is_some_and(|b| b.get_aabb().collides_with_aabr(aabb))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyOptions;
    use crate::math::Vec2;

    #[test]
    fn overlapping_dynamic_bodies_produce_a_pair() {
        let mut bodies = SlotMap::<BodyId, Body>::with_key();
        let mut a = Body::new_dynamic(
            BodyOptions {
                position: Vec2::new(0.0, 0.0),
                ..Default::default()
            },
            Default::default(),
        );
        a.add_shape(crate::shape::Shape::circle(1.0), None, None).unwrap();
        a.update_aabb();
        let mut b = Body::new_dynamic(
            BodyOptions {
                position: Vec2::new(0.5, 0.0),
                ..Default::default()
            },
            Default::default(),
        );
        b.add_shape(crate::shape::Shape::circle(1.0), None, None).unwrap();
        b.update_aabb();
        bodies.insert(a);
        bodies.insert(b);

        let mut grid = SpatialHash::new(BroadphaseConfig::default());
        let pairs = grid.collision_pairs(&bodies);
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn far_apart_dynamic_bodies_produce_no_pair() {
        let mut bodies = SlotMap::<BodyId, Body>::with_key();
        let mut a = Body::new_dynamic(BodyOptions::default(), Default::default());
        a.add_shape(crate::shape::Shape::circle(0.5), None, None).unwrap();
        a.update_aabb();
        let mut b = Body::new_dynamic(
            BodyOptions {
                position: Vec2::new(1000.0, 1000.0),
                ..Default::default()
            },
            Default::default(),
        );
        b.add_shape(crate::shape::Shape::circle(0.5), None, None).unwrap();
        b.update_aabb();
        bodies.insert(a);
        bodies.insert(b);

        let mut grid = SpatialHash::new(BroadphaseConfig::default());
        assert!(grid.collision_pairs(&bodies).is_empty());
    }
}
