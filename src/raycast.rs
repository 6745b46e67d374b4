//! Raycasting (§4.7): closest-hit and all-hits queries against a world's bodies.
//!
//! Expressed directly over a body slotmap and a [`Broadphase`] rather than over
//! [`crate::world::World`] so `world.rs` can reuse it for CCD's own ray cast
//! (§4.6) without a circular module dependency. Per §9 "Control flow previously
//! carried by coroutines/closures": this returns a plain `Vec`, there is no
//! mid-traversal callback contract.

use slotmap::SlotMap;

use crate::body::{Body, BodyId, ShapeId};
use crate::broadphase::Broadphase;
use crate::math::{Aabb, Vec2};
use crate::shape::CollisionGroup;

/// A single ray-vs-shape intersection (§4.7).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub body: BodyId,
    pub shape: ShapeId,
    pub point: Vec2,
    pub normal: Vec2,
    pub distance: f64,
    pub fraction: f64,
}

/// Query filters (§4.7).
pub struct RaycastOptions<'a> {
    /// Only shapes whose `collision_group` intersects this mask are considered.
    pub collision_mask: CollisionGroup,
    pub skip_backfaces: bool,
    /// Arbitrary predicate; `false` skips the (body, shape) pair.
    pub filter: Option<&'a dyn Fn(BodyId, ShapeId) -> bool>,
}

impl Default for RaycastOptions<'_> {
    fn default() -> Self {
        Self {
            collision_mask: crate::shape::ALL_GROUPS,
            skip_backfaces: false,
            filter: None,
        }
    }
}

/// Every ray-vs-shape intersection between `from` and `to`, in ascending distance.
pub fn raycast_all(
    bodies: &SlotMap<BodyId, Body>,
    broadphase: &dyn Broadphase,
    from: Vec2,
    to: Vec2,
    options: &RaycastOptions,
) -> Vec<Hit> {
    let ray_aabb = Aabb {
        min: Vec2::partial_min(from, to),
        max: Vec2::partial_max(from, to),
    };
    let candidates = broadphase.aabb_query(bodies, ray_aabb);

    let mut hits = Vec::new();
    for body_id in candidates {
        let Some(body) = bodies.get(body_id) else {
            continue;
        };
        if !body.collision_response {
            continue;
        }
        for (shape_id, shape) in body.shapes() {
            if !shape.collision_response {
                continue;
            }
            if shape.collision_group & options.collision_mask == 0 {
                continue;
            }
            if let Some(filter) = options.filter {
                if !filter(body_id, shape_id) {
                    continue;
                }
            }
            if let Some(shape_hit) =
                shape.raycast(from, to, body.position, body.angle, options.skip_backfaces)
            {
                hits.push(Hit {
                    body: body_id,
                    shape: shape_id,
                    point: shape_hit.point,
                    normal: shape_hit.normal,
                    distance: shape_hit.distance,
                    fraction: shape_hit.fraction,
                });
            }
        }
    }

    hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
    hits
}

/// The single closest ray-vs-shape intersection, if any.
pub fn raycast(
    bodies: &SlotMap<BodyId, Body>,
    broadphase: &dyn Broadphase,
    from: Vec2,
    to: Vec2,
    options: &RaycastOptions,
) -> Option<Hit> {
    raycast_all(bodies, broadphase, from, to, options).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyOptions;
    use crate::broadphase::SpatialHash;
    use crate::config::BroadphaseConfig;
    use crate::shape::Shape;

    fn box_body(bodies: &mut SlotMap<BodyId, Body>, x: f64) -> BodyId {
        let mut body = Body::new_static(BodyOptions {
            position: Vec2::new(x, 0.0),
            ..Default::default()
        });
        body.add_shape(Shape::rectangle(1.0, 1.0), None, None).unwrap();
        body.update_aabb();
        bodies.insert(body)
    }

    #[test]
    fn raycast_returns_closest_of_three_aligned_boxes() {
        let mut bodies = SlotMap::<BodyId, Body>::with_key();
        let first = box_body(&mut bodies, 2.0);
        box_body(&mut bodies, 4.0);
        box_body(&mut bodies, 6.0);

        let mut grid = SpatialHash::new(BroadphaseConfig::default());
        let _ = grid.collision_pairs(&bodies);

        let options = RaycastOptions::default();
        let hit = raycast(
            &bodies,
            &grid,
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            &options,
        )
        .expect("ray should hit the nearest box");
        assert_eq!(hit.body, first);
    }

    #[test]
    fn raycast_all_returns_hits_in_ascending_distance() {
        let mut bodies = SlotMap::<BodyId, Body>::with_key();
        box_body(&mut bodies, 2.0);
        box_body(&mut bodies, 4.0);
        box_body(&mut bodies, 6.0);

        let mut grid = SpatialHash::new(BroadphaseConfig::default());
        let _ = grid.collision_pairs(&bodies);
        let options = RaycastOptions::default();
        let hits = raycast_all(
            &bodies,
            &grid,
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            &options,
        );
        assert_eq!(hits.len(), 3);
        assert!(hits[0].distance < hits[1].distance);
        assert!(hits[1].distance < hits[2].distance);
    }
}
