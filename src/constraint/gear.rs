//! Gear constraint: locks the ratio between two bodies' angular velocities.

use crate::body::{Body, BodyId};
use crate::equation::JointEquation;

#[derive(Debug, Clone)]
pub struct GearConstraint {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub collide_connected: bool,
    pub ratio: f64,
    /// Relative angle target at construction time: `angle_b - ratio * angle_a`.
    reference_angle: f64,
    pub max_force: f64,
    pub(crate) equations: Vec<JointEquation>,
}

impl GearConstraint {
    pub fn new(body_a: BodyId, body_b: BodyId, ratio: f64, body_a_state: &Body, body_b_state: &Body) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: true,
            ratio,
            reference_angle: body_b_state.angle - ratio * body_a_state.angle,
            max_force: f64::INFINITY,
            equations: vec![JointEquation::new(body_a, body_b, -f64::INFINITY, f64::INFINITY)],
        }
    }

    pub fn update(&mut self, body_a: &Body, body_b: &Body) {
        let eq = &mut self.equations[0].equation;
        eq.jacobian = [0.0, 0.0, -self.ratio, 0.0, 0.0, 1.0];
        eq.min_force = -self.max_force;
        eq.max_force = self.max_force;
        let relative_angle = body_b.angle - self.ratio * body_a.angle;
        eq.offset = relative_angle - self.reference_angle;
        eq.needs_update = true;
    }
}
