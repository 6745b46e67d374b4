//! Revolute (pivot) constraint: optional motor, optional angle limits (§3 "Constraint").

use crate::body::{Body, BodyId};
use crate::equation::JointEquation;
use crate::math::{cross, rotate, Vec2};

#[derive(Debug, Clone)]
pub struct RevoluteConstraint {
    pub body_a: BodyId,
    pub body_b: BodyId,
    /// Pivot anchor in body A's local frame.
    pub pivot_a: Vec2,
    /// Pivot anchor in body B's local frame.
    pub pivot_b: Vec2,
    pub collide_connected: bool,
    pub motor_enabled: bool,
    pub motor_speed: f64,
    pub motor_max_force: f64,
    pub limits_enabled: bool,
    pub lower_angle: f64,
    pub upper_angle: f64,
    /// [x, y] point-to-point rows, then optional motor row, then optional lower/upper rows.
    pub(crate) equations: Vec<JointEquation>,
}

impl RevoluteConstraint {
    pub fn new(body_a: BodyId, body_b: BodyId, pivot_a: Vec2, pivot_b: Vec2) -> Self {
        let point_to_point = (0..2)
            .map(|_| JointEquation::new(body_a, body_b, -f64::INFINITY, f64::INFINITY))
            .collect();
        Self {
            body_a,
            body_b,
            pivot_a,
            pivot_b,
            collide_connected: false,
            motor_enabled: false,
            motor_speed: 0.0,
            motor_max_force: 0.0,
            limits_enabled: false,
            lower_angle: 0.0,
            upper_angle: 0.0,
            equations: point_to_point,
        }
    }

    fn ensure_equation_count(&mut self) {
        let wanted = 2 + self.motor_enabled as usize + 2 * self.limits_enabled as usize;
        while self.equations.len() < wanted {
            self.equations
                .push(JointEquation::new(self.body_a, self.body_b, 0.0, 0.0));
        }
        self.equations.truncate(wanted.max(2));
    }

    pub fn update(&mut self, body_a: &Body, body_b: &Body) {
        self.ensure_equation_count();

        let ra = rotate(self.pivot_a, body_a.angle);
        let rb = rotate(self.pivot_b, body_b.angle);
        let anchor_a = body_a.position + ra;
        let anchor_b = body_b.position + rb;
        let gap = anchor_b - anchor_a;

        for (axis, unit) in [(0usize, Vec2::new(1.0, 0.0)), (1, Vec2::new(0.0, 1.0))] {
            let eq = &mut self.equations[axis].equation;
            eq.jacobian = [
                -unit.x,
                -unit.y,
                -cross(ra, unit),
                unit.x,
                unit.y,
                cross(rb, unit),
            ];
            eq.offset = gap.dot(unit);
            eq.min_force = -f64::INFINITY;
            eq.max_force = f64::INFINITY;
            eq.needs_update = true;
        }

        let mut idx = 2;
        if self.motor_enabled {
            let eq = &mut self.equations[idx].equation;
            eq.jacobian = [0.0, 0.0, -1.0, 0.0, 0.0, 1.0];
            eq.relative_velocity = self.motor_speed;
            eq.min_force = -self.motor_max_force;
            eq.max_force = self.motor_max_force;
            eq.offset = 0.0;
            eq.needs_update = true;
            idx += 1;
        }

        if self.limits_enabled {
            let relative_angle = body_b.angle - body_a.angle;
            {
                let eq = &mut self.equations[idx].equation;
                eq.jacobian = [0.0, 0.0, -1.0, 0.0, 0.0, 1.0];
                let violation = relative_angle - self.lower_angle;
                eq.enabled = violation < 0.0;
                eq.offset = violation;
                eq.min_force = 0.0;
                eq.max_force = f64::INFINITY;
                eq.needs_update = true;
            }
            {
                let eq = &mut self.equations[idx + 1].equation;
                eq.jacobian = [0.0, 0.0, 1.0, 0.0, 0.0, -1.0];
                let violation = self.upper_angle - relative_angle;
                eq.enabled = violation < 0.0;
                eq.offset = violation;
                eq.min_force = 0.0;
                eq.max_force = f64::INFINITY;
                eq.needs_update = true;
            }
        }
    }
}
