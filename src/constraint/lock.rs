//! Lock constraint: holds two bodies at a fixed relative position and angle.

use crate::body::{Body, BodyId};
use crate::equation::JointEquation;
use crate::math::{cross, rotate, Vec2};

#[derive(Debug, Clone)]
pub struct LockConstraint {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub collide_connected: bool,
    /// Relative offset of B from A, captured in A's local frame at construction time.
    local_offset_b: Vec2,
    /// Relative angle of B from A at construction time.
    local_angle_b: f64,
    /// [x, y, angle] rows.
    pub(crate) equations: Vec<JointEquation>,
}

impl LockConstraint {
    pub fn new(body_a: BodyId, body_b: BodyId, body_a_state: &Body, body_b_state: &Body) -> Self {
        let local_offset_b = body_a_state.to_local(body_b_state.position);
        let local_angle_b = body_b_state.angle - body_a_state.angle;
        Self {
            body_a,
            body_b,
            collide_connected: false,
            local_offset_b,
            local_angle_b,
            equations: vec![
                JointEquation::new(body_a, body_b, -f64::INFINITY, f64::INFINITY),
                JointEquation::new(body_a, body_b, -f64::INFINITY, f64::INFINITY),
                JointEquation::new(body_a, body_b, -f64::INFINITY, f64::INFINITY),
            ],
        }
    }

    pub fn update(&mut self, body_a: &Body, body_b: &Body) {
        let ra = rotate(self.local_offset_b, body_a.angle);
        let target = body_a.position + ra;
        let gap = body_b.position - target;

        for (axis, unit) in [(0usize, Vec2::new(1.0, 0.0)), (1, Vec2::new(0.0, 1.0))] {
            let eq = &mut self.equations[axis].equation;
            eq.jacobian = [
                -unit.x,
                -unit.y,
                -cross(ra, unit),
                unit.x,
                unit.y,
                0.0,
            ];
            eq.offset = gap.dot(unit);
            eq.needs_update = true;
        }

        let angle_eq = &mut self.equations[2].equation;
        angle_eq.jacobian = [0.0, 0.0, -1.0, 0.0, 0.0, 1.0];
        let relative_angle = body_b.angle - body_a.angle;
        angle_eq.offset = relative_angle - self.local_angle_b;
        angle_eq.needs_update = true;
    }
}
