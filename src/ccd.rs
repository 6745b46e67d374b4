//! Continuous collision detection (§4.6): binary-search time-of-impact for
//! dynamic bodies that opt in via `ccd_speed_threshold`, invoked from the
//! integration phase (§4.8 step 9) in place of plain Euler position update.

use slotmap::SlotMap;

use crate::body::{Body, BodyId};
use crate::broadphase::Broadphase;
use crate::math::Vec2;
use crate::raycast::{self, RaycastOptions};

/// Move body `id` from its current pose to `end_position`/`end_angle` over this
/// step, running CCD if the body opted in and is moving fast enough; otherwise a
/// plain linear move. Leaves velocity untouched (already integrated by the caller).
pub fn integrate_pose(
    id: BodyId,
    bodies: &mut SlotMap<BodyId, Body>,
    broadphase: &dyn Broadphase,
    velocity: Vec2,
    angular_velocity: f64,
    h: f64,
) {
    let start_position = bodies[id].position;
    let start_angle = bodies[id].angle;
    let end_position = start_position + velocity * h;
    let fixed_rotation = bodies[id]
        .dynamic_properties()
        .map(|dp| dp.fixed_rotation)
        .unwrap_or(false);
    let end_angle = if fixed_rotation {
        start_angle
    } else {
        start_angle + angular_velocity * h
    };

    let threshold = bodies[id].dynamic_properties().and_then(|dp| dp.ccd_speed_threshold);
    let ccd_iterations = bodies[id]
        .dynamic_properties()
        .map(|dp| dp.ccd_iterations)
        .unwrap_or(0);

    let Some(threshold) = threshold else {
        set_pose(bodies, id, end_position, end_angle);
        return;
    };
    if velocity.magnitude_squared() < threshold * threshold {
        set_pose(bodies, id, end_position, end_angle);
        return;
    }

    // §4.6: "the bitwise-OR of the body's shapes' collision_group/collision_mask"
    // filters raycast candidates for this body's CCD pass.
    let mask = bodies[id]
        .shapes()
        .fold(0u32, |mask, (_, shape)| mask | shape.collision_mask);

    let self_id = id;
    let options = RaycastOptions {
        collision_mask: mask,
        skip_backfaces: false,
        filter: Some(&move |other, _shape| other != self_id),
    };

    let Some(hit) = raycast::raycast(bodies, broadphase, start_position, end_position, &options) else {
        set_pose(bodies, id, end_position, end_angle);
        return;
    };

    let hit_body = hit.body;
    let mut lo = 0.0_f64;
    let mut hi = hit.fraction;
    for _ in 0..ccd_iterations.max(1) {
        let mid = (lo + hi) / 2.0;
        let candidate_position = start_position + (end_position - start_position) * mid;
        let candidate_angle = start_angle + (end_angle - start_angle) * mid;
        if shapes_overlap_at(bodies, id, candidate_position, candidate_angle, hit_body) {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    let toi_position = start_position + (end_position - start_position) * lo;
    let toi_angle = start_angle + (end_angle - start_angle) * lo;
    set_pose(bodies, id, toi_position, toi_angle);
}

fn set_pose(bodies: &mut SlotMap<BodyId, Body>, id: BodyId, position: Vec2, angle: f64) {
    let body = &mut bodies[id];
    body.position = position;
    body.angle = angle;
    body.mark_aabb_dirty();
}

/// Whether body `id`, placed at `(position, angle)`, overlaps `other_id` at its
/// current pose — the narrowphase query the TOI binary search converges against.
fn shapes_overlap_at(
    bodies: &SlotMap<BodyId, Body>,
    id: BodyId,
    position: Vec2,
    angle: f64,
    other_id: BodyId,
) -> bool {
    let body = &bodies[id];
    let other = &bodies[other_id];
    for (_, shape) in body.shapes() {
        let iso_a = shape.world_transform(position, angle);
        for (_, other_shape) in other.shapes() {
            let iso_b = other_shape.world_transform(other.position, other.angle);
            if crate::narrowphase::shapes_overlap(iso_a, shape.geometry(), iso_b, other_shape.geometry()) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BodyOptions, DynamicBodyOptions};
    use crate::broadphase::SpatialHash;
    use crate::config::BroadphaseConfig;
    use crate::shape::Shape;

    fn setup(speed: f64, ccd_threshold: Option<f64>) -> (SlotMap<BodyId, Body>, BodyId, SpatialHash) {
        let mut bodies = SlotMap::<BodyId, Body>::with_key();
        let mut bullet = Body::new_dynamic(
            BodyOptions {
                position: Vec2::new(-5.0, 0.0),
                ..Default::default()
            },
            DynamicBodyOptions {
                velocity: Vec2::new(speed, 0.0),
                ccd_speed_threshold: ccd_threshold,
                ccd_iterations: 10,
                ..Default::default()
            },
        );
        bullet.add_shape(Shape::circle(0.1), None, None).unwrap();
        bullet.update_aabb();
        let bullet_id = bodies.insert(bullet);

        let mut wall = Body::new_static(BodyOptions::default());
        wall.add_shape(Shape::rectangle(0.2, 5.0), None, None).unwrap();
        wall.update_aabb();
        bodies.insert(wall);

        let mut grid = SpatialHash::new(BroadphaseConfig::default());
        let _ = grid.collision_pairs(&bodies);
        (bodies, bullet_id, grid)
    }

    #[test]
    fn ccd_prevents_tunneling_through_thin_wall() {
        let (mut bodies, id, grid) = setup(1000.0, Some(10.0));
        integrate_pose(id, &mut bodies, &grid, Vec2::new(1000.0, 0.0), 0.0, 1.0 / 60.0);
        assert!(bodies[id].position.x <= 0.0, "CCD should stop the body before the wall");
    }

    #[test]
    fn without_ccd_fast_body_tunnels_through() {
        let (mut bodies, id, grid) = setup(1000.0, None);
        integrate_pose(id, &mut bodies, &grid, Vec2::new(1000.0, 0.0), 0.0, 1.0 / 60.0);
        assert!(bodies[id].position.x > 0.0, "without CCD the body should tunnel past the wall");
    }
}
