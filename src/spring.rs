//! Springs: force generators applied during §4.8 step 1, distinct from
//! [`crate::constraint::Constraint`] because they never enter the solver —
//! they just add to `force`/`torque` like any other applied force.

use slotmap::new_key_type;

use crate::body::{Body, BodyId};
use crate::math::{rotate, Vec2};

new_key_type! {
    /// Identifies a [`Spring`] registered with a [`crate::world::World`].
    pub struct SpringId;
}

/// A linear spring between two anchor points on two bodies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spring {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub rest_length: f64,
    pub stiffness: f64,
    pub damping: f64,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
}

impl Spring {
    pub fn new(body_a: BodyId, body_b: BodyId, rest_length: f64, stiffness: f64, damping: f64) -> Self {
        Self {
            body_a,
            body_b,
            rest_length,
            stiffness,
            damping,
            local_anchor_a: Vec2::zero(),
            local_anchor_b: Vec2::zero(),
        }
    }

    /// Apply this spring's force to both endpoint bodies (§4.8 step 1 "Apply forces").
    pub fn apply_force(&self, body_a: &mut Body, body_b: &mut Body) {
        let ra = rotate(self.local_anchor_a, body_a.angle);
        let rb = rotate(self.local_anchor_b, body_b.angle);
        let world_a = body_a.position + ra;
        let world_b = body_b.position + rb;
        let delta = world_b - world_a;
        let len = delta.magnitude();
        if len <= f64::EPSILON {
            return;
        }
        let normal = delta / len;

        let relative_velocity =
            (body_b.velocity() + crate::math::cross_scalar_vec(body_b.angular_velocity(), rb))
                - (body_a.velocity() + crate::math::cross_scalar_vec(body_a.angular_velocity(), ra));

        let spring_force = self.stiffness * (len - self.rest_length);
        let damping_force = self.damping * relative_velocity.dot(normal);
        let force = normal * (spring_force + damping_force);

        body_a.apply_force(force, Some(ra));
        body_b.apply_force(-force, Some(rb));
    }
}
