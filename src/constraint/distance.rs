//! Distance constraint: holds two bodies at a fixed separation (§3 "Constraint").

use crate::body::{Body, BodyId};
use crate::equation::JointEquation;
use crate::math::Vec2;

#[derive(Debug, Clone)]
pub struct DistanceConstraint {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub distance: f64,
    pub collide_connected: bool,
    pub max_force: f64,
    pub(crate) equations: Vec<JointEquation>,
}

impl DistanceConstraint {
    pub fn new(body_a: BodyId, body_b: BodyId, distance: f64) -> Self {
        Self {
            body_a,
            body_b,
            distance,
            collide_connected: true,
            max_force: f64::INFINITY,
            equations: vec![JointEquation::new(body_a, body_b, -f64::INFINITY, f64::INFINITY)],
        }
    }

    pub fn update(&mut self, body_a: &Body, body_b: &Body) {
        let delta = body_b.position - body_a.position;
        let normal = crate::math::try_normalized(delta);
        let eq = &mut self.equations[0].equation;
        eq.max_force = self.max_force;
        eq.min_force = -self.max_force;
        eq.jacobian = [-normal.x, -normal.y, 0.0, normal.x, normal.y, 0.0];
        eq.offset = delta.magnitude() - self.distance;
        eq.needs_update = true;
    }
}
